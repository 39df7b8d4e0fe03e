use std::fmt;

/// Progress states reported to the host while a stream runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Streaming,
    Finished,
    Cancelled,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Cancelled | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Streaming => "streaming",
            Status::Finished => "finished",
            Status::Cancelled => "cancelled",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Text surrounding the cursor, as handed over by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    pub before_cursor: String,
    pub after_cursor: String,
    pub visual_selection: Option<String>,
}

/// Editor side of a stream.
///
/// Calls arrive from the dispatcher's task, one at a time and in the order
/// the deltas were produced.
pub trait Host: Send + Sync + 'static {
    /// Insert `text` at the cursor and move the cursor past it.
    fn insert_at_cursor(&self, text: &str);

    fn notify_progress(&self, status: Status, detail: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_end_states_are_terminal() {
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Streaming.is_terminal());
        assert!(Status::Finished.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(Status::Failed.is_terminal());
    }
}
