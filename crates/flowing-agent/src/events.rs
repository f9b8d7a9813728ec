//! Workflow event types

use flowing_ai::Message;
use serde::{Deserialize, Serialize};

use crate::workflow::RunOutcome;

/// Events emitted while a turn runs.
///
/// The workflow never prints; callers subscribe and render these however
/// they like.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A run started
    RunStart,

    /// The model is being invoked (attempt is 1-based)
    GenerationStart { attempt: u32 },

    /// The model replied
    GenerationEnd { message: Message },

    /// Extracted code is about to run in the sandbox
    ExecutionStart { attempt: u32 },

    /// An execution attempt finished
    ExecutionEnd {
        success: bool,
        output_path: Option<String>,
        error: Option<String>,
    },

    /// A repair message was appended and the loop is going back to the model
    RepairRequested { retry_count: u32, error: String },

    /// The run reached a terminal state
    RunEnd { outcome: RunOutcome },
}

impl WorkflowEvent {
    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowEvent::RunEnd { .. })
    }
}
