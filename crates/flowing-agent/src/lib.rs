//! flowing-agent: the generate → execute → repair workflow
//!
//! This crate coordinates one user turn: invoke the model, extract the
//! fenced code block from its reply, run it in an isolated child process,
//! and on failure feed the error back for a bounded number of repair
//! attempts. The interactive shell, configuration, and credentials live in
//! the CLI crate; the model call lives behind [`flowing_ai::ModelClient`].

pub mod conversation;
pub mod error;
pub mod events;
pub mod extractor;
pub mod handle;
pub mod sandbox;
pub mod workflow;

pub use conversation::TurnState;
pub use error::{Error, Result};
pub use events::WorkflowEvent;
pub use handle::WorkflowHandle;
pub use sandbox::{ExecError, ExecOutcome, SandboxConfig, SandboxRunner};
pub use workflow::{RunOutcome, Workflow, WorkflowConfig};
