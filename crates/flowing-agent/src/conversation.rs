//! Per-turn conversation state threaded through the workflow.

use flowing_ai::Message;

/// The mutable record of one orchestration run.
///
/// Created from the prior history plus the new user message, mutated in
/// place by the workflow, then handed back to the caller which persists
/// `messages` as the next turn's baseline. `output_path` and `last_error`
/// are mutually exclusive: at most one is set at any point in time.
#[derive(Debug, Default)]
pub struct TurnState {
    /// Ordered conversation; append-only within a run
    pub messages: Vec<Message>,
    /// Extracted source of the most recent execution attempt
    pub last_code: Option<String>,
    /// Artifact path reported by the last successful execution
    pub output_path: Option<String>,
    /// Execution failures so far this turn; reset to 0 on success
    pub retry_count: u32,
    /// Truncated error text from the most recent failed execution
    pub last_error: Option<String>,
}

impl TurnState {
    /// Start a new turn: prior history plus the new user message.
    pub fn new(history: Vec<Message>, user_text: impl Into<String>) -> Self {
        let mut messages = history;
        messages.push(Message::user(user_text));
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Append a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The most recently appended assistant reply, if any.
    pub fn newest_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_assistant())
    }

    /// Record a successful execution.
    pub fn record_success(&mut self, code: String, output_path: Option<String>) {
        self.last_code = Some(code);
        self.output_path = output_path;
        self.last_error = None;
        self.retry_count = 0;
    }

    /// Record a failed execution attempt. Returns the new retry count.
    pub fn record_failure(&mut self, code: Option<String>, error: String) -> u32 {
        if code.is_some() {
            self.last_code = code;
        }
        self.output_path = None;
        self.last_error = Some(error);
        self.retry_count += 1;
        self.retry_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowing_ai::Role;

    #[test]
    fn test_new_appends_user_message() {
        let history = vec![Message::system("sys")];
        let state = TurnState::new(history, "draw a pipeline");
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].role, Role::User);
        assert_eq!(state.retry_count, 0);
    }

    #[test]
    fn test_success_clears_error_and_resets_retries() {
        let mut state = TurnState::new(vec![], "x");
        state.record_failure(Some("bad code".into()), "boom".into());
        assert_eq!(state.retry_count, 1);
        assert!(state.last_error.is_some());

        state.record_success("good code".into(), Some("out.png".into()));
        assert_eq!(state.retry_count, 0);
        assert!(state.last_error.is_none());
        assert_eq!(state.output_path.as_deref(), Some("out.png"));
    }

    #[test]
    fn test_failure_clears_output_path() {
        let mut state = TurnState::new(vec![], "x");
        state.record_success("code".into(), Some("out.png".into()));
        state.record_failure(None, "boom".into());
        assert!(state.output_path.is_none());
        assert_eq!(state.last_error.as_deref(), Some("boom"));
        // last_code from the earlier attempt is kept for inspection
        assert_eq!(state.last_code.as_deref(), Some("code"));
    }

    #[test]
    fn test_newest_assistant_picks_latest() {
        let mut state = TurnState::new(vec![], "x");
        state.push(Message::assistant("first"));
        state.push(Message::user("repair"));
        state.push(Message::assistant("second"));
        assert_eq!(state.newest_assistant().unwrap().content, "second");
    }
}
