use serde::Serialize;

use super::{ChatCompletionTool, ChatMessage, ToolChoice};
use crate::error::StreamError;

/// Chat completion request body.
///
/// Every optional field is omitted from the JSON when unset, so the provider's
/// own defaults apply.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ChatCompletionTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Stop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// `stream_options` request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

/// `stop` request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Stop {
    Single(String),
    Multi(Vec<String>),
}

/// `response_format` request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

impl ChatCompletionRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ChatCompletionTool>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn with_stop(mut self, stop: Stop) -> Self {
        self.stop = Some(stop);
        self
    }

    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Ask the provider to append a usage-only chunk before `[DONE]`.
    #[must_use]
    pub fn with_usage_in_stream(mut self) -> Self {
        self.stream_options = Some(StreamOptions {
            include_usage: true,
        });
        self
    }

    /// Reject requests the provider would refuse anyway.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] for an empty model, an empty
    /// message list, or out-of-range sampling parameters.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.model.trim().is_empty() {
            return Err(StreamError::InvalidRequest("model must not be empty".into()));
        }
        if self.messages.is_empty() {
            return Err(StreamError::InvalidRequest(
                "messages must contain at least one message".into(),
            ));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(StreamError::InvalidRequest(format!(
                    "temperature must be within 0..=2, got {temperature}"
                )));
            }
        }
        if self.n == Some(0) {
            return Err(StreamError::InvalidRequest("n must be greater than 0".into()));
        }
        if self.tool_choice.is_some() && self.tools.is_empty() {
            return Err(StreamError::InvalidRequest(
                "tool_choice requires at least one tool".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::chat::ToolParameters;

    #[test]
    fn test_unset_fields_are_omitted() {
        let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("hi")]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }

    #[test]
    fn test_builder_fields_serialize() {
        let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("hi")])
            .with_tools(vec![ChatCompletionTool::function(
                "f",
                "does f",
                ToolParameters::new(),
            )])
            .with_tool_choice(ToolChoice::Required)
            .with_response_format(ResponseFormat::JsonObject)
            .with_stop(Stop::Multi(vec!["\n\n".into()]))
            .with_usage_in_stream();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tool_choice"], "required");
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["stop"][0], "\n\n");
        assert_eq!(value["stream_options"]["include_usage"], true);
        assert_eq!(value["tools"][0]["function"]["name"], "f");
    }

    #[test]
    fn test_validate() {
        assert!(ChatCompletionRequest::new("", vec![ChatMessage::user("hi")])
            .validate()
            .is_err());
        assert!(ChatCompletionRequest::new("m", Vec::new()).validate().is_err());
        assert!(ChatCompletionRequest::new("m", vec![ChatMessage::user("hi")])
            .with_temperature(3.0)
            .validate()
            .is_err());
        assert!(ChatCompletionRequest::new("m", vec![ChatMessage::user("hi")])
            .with_tool_choice(ToolChoice::Auto)
            .validate()
            .is_err());
        assert!(ChatCompletionRequest::new("m", vec![ChatMessage::user("hi")])
            .validate()
            .is_ok());
    }
}
