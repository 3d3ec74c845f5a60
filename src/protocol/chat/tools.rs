use serde::{Deserialize, Serialize};

/// A tool definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionTool {
    #[serde(rename = "type")]
    pub type_: String,
    pub function: ToolFunction,
}

/// Function declaration within a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: ToolParameters,
}

impl ChatCompletionTool {
    #[must_use]
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
    ) -> Self {
        let description = description.into();
        Self {
            type_: "function".to_string(),
            function: ToolFunction {
                name: name.into(),
                description: (!description.is_empty()).then_some(description),
                parameters,
            },
        }
    }
}

/// JSON-schema object describing a function's parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolParameters(serde_json::Map<String, serde_json::Value>);

impl Default for ToolParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolParameters {
    /// An empty `{"type":"object","properties":{}}` schema.
    #[must_use]
    pub fn new() -> Self {
        let mut schema = serde_json::Map::new();
        schema.insert("type".into(), "object".into());
        schema.insert(
            "properties".into(),
            serde_json::Value::Object(serde_json::Map::new()),
        );
        Self(schema)
    }

    #[must_use]
    pub fn add_property(self, name: &str, type_: &str, description: &str) -> Self {
        self.with_property(
            name,
            serde_json::json!({"type": type_, "description": description}),
        )
    }

    #[must_use]
    pub fn add_array_property(self, name: &str, item_type: &str, description: &str) -> Self {
        self.with_property(
            name,
            serde_json::json!({
                "type": "array",
                "items": {"type": item_type},
                "description": description,
            }),
        )
    }

    #[must_use]
    pub fn add_enum_property(
        self,
        name: &str,
        type_: &str,
        description: &str,
        values: &[&str],
    ) -> Self {
        self.with_property(
            name,
            serde_json::json!({"type": type_, "description": description, "enum": values}),
        )
    }

    #[must_use]
    pub fn required(mut self, names: &[&str]) -> Self {
        self.0.insert("required".into(), serde_json::json!(names));
        self
    }

    fn with_property(mut self, name: &str, schema: serde_json::Value) -> Self {
        if let Some(serde_json::Value::Object(properties)) = self.0.get_mut("properties") {
            properties.insert(name.to_owned(), schema);
        }
        self
    }

    #[must_use]
    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

/// `tool_choice` request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    None,
    Auto,
    Required,
    Function(String),
}

impl Serialize for ToolChoice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ToolChoice::None => serializer.serialize_str("none"),
            ToolChoice::Auto => serializer.serialize_str("auto"),
            ToolChoice::Required => serializer.serialize_str("required"),
            ToolChoice::Function(name) => serde_json::json!({
                "type": "function",
                "function": {"name": name},
            })
            .serialize(serializer),
        }
    }
}
