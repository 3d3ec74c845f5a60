use crate::protocol::chat::{ToolCall, ToolCallDelta};

/// Assembles streamed tool-call fragments into complete [`ToolCall`] records.
///
/// Holds at most one open record. A fragment for a different index closes the
/// open record into the closed list and opens a new one; [`Self::finish`]
/// closes whatever is still open and hands back every record in arrival order.
///
/// Within one fragment a non-empty function name takes precedence over an
/// arguments piece: when both are present only the name is applied. Repeated
/// ids or names for the same index overwrite the previous value.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    open: Option<ToolCall>,
    closed: Vec<ToolCall>,
}

impl ToolCallAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment, in wire order.
    pub fn apply(&mut self, fragment: &ToolCallDelta) {
        if let Some(open) = &self.open {
            if fragment.index < open.index {
                tracing::warn!(
                    open_index = open.index,
                    fragment_index = fragment.index,
                    "tool call fragment index went backwards"
                );
            }
        }
        let needs_rollover = self
            .open
            .as_ref()
            .map_or(true, |open| open.index != fragment.index);
        if needs_rollover {
            self.close_open();
            self.open = Some(ToolCall::new(fragment.index));
        }
        let Some(open) = self.open.as_mut() else {
            return;
        };

        if let Some(id) = non_empty(fragment.id.as_deref()) {
            if !open.id.is_empty() && open.id != id {
                tracing::debug!(index = open.index, old = %open.id, new = id, "tool call id overwritten");
            }
            id.clone_into(&mut open.id);
        }
        if let Some(type_) = non_empty(fragment.type_.as_deref()) {
            type_.clone_into(&mut open.type_);
        }
        let Some(function) = &fragment.function else {
            return;
        };
        if let Some(name) = non_empty(function.name.as_deref()) {
            if !open.function.name.is_empty() && open.function.name != name {
                tracing::debug!(
                    index = open.index,
                    old = %open.function.name,
                    new = name,
                    "tool call name overwritten"
                );
            }
            name.clone_into(&mut open.function.name);
        } else if let Some(arguments) = non_empty(function.arguments.as_deref()) {
            open.function.arguments.push_str(arguments);
        }
    }

    /// Whether any fragment has been applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_none() && self.closed.is_empty()
    }

    /// Index of the record currently being assembled.
    #[must_use]
    pub fn open_index(&self) -> Option<u32> {
        self.open.as_ref().map(|open| open.index)
    }

    /// Records closed so far, in arrival order.
    #[must_use]
    pub fn closed(&self) -> &[ToolCall] {
        &self.closed
    }

    /// Close the open record and take every assembled record.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        self.close_open();
        std::mem::take(&mut self.closed)
    }

    fn close_open(&mut self) {
        if let Some(done) = self.open.take() {
            tracing::trace!(
                index = done.index,
                name = %done.function.name,
                arguments_len = done.function.arguments.len(),
                "tool call closed"
            );
            self.closed.push(done);
        }
    }
}

#[inline]
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
