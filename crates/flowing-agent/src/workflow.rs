//! The generate → execute → repair state machine.

use std::sync::Arc;

use flowing_ai::{Message, ModelClient};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{
    conversation::TurnState,
    error::Result,
    events::WorkflowEvent,
    extractor,
    handle::WorkflowHandle,
    sandbox::SandboxRunner,
};

/// Retry-limit and truncation policy for one turn
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Repair cycles permitted after the initial attempt. With the default
    /// of 2 a turn makes at most 3 execution attempts.
    pub max_repairs: u32,
    /// Error text injected into repair messages is capped at this many
    /// characters to bound prompt growth
    pub error_excerpt: usize,
    /// How much of a code-free reply is quoted back to the model
    pub reply_excerpt: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_repairs: 2,
            error_excerpt: 1000,
            reply_excerpt: 300,
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The last execution attempt succeeded
    Success,
    /// The retry budget was exhausted without a successful execution
    Failure,
    /// The caller aborted the run
    Cancelled,
}

/// Workflow phases. `Done` is absorbing.
enum Phase {
    Generating,
    Executing,
    Repairing,
    Done(RunOutcome),
}

/// Drives one user turn to a terminal state.
///
/// Holds no cross-run state: every [`run_turn`](Workflow::run_turn) gets a
/// fresh [`TurnState`] and a fresh cancellation token, so a host that
/// processes turns one at a time per conversation needs no locking.
pub struct Workflow {
    client: Arc<dyn ModelClient>,
    sandbox: SandboxRunner,
    config: WorkflowConfig,
    event_tx: broadcast::Sender<WorkflowEvent>,
    handle: WorkflowHandle,
}

impl Workflow {
    pub fn new(client: Arc<dyn ModelClient>, sandbox: SandboxRunner) -> Self {
        Self::with_config(client, sandbox, WorkflowConfig::default())
    }

    pub fn with_config(
        client: Arc<dyn ModelClient>,
        sandbox: SandboxRunner,
        config: WorkflowConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            client,
            sandbox,
            config,
            event_tx,
            handle: WorkflowHandle::new(),
        }
    }

    /// Subscribe to workflow events
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for aborting a run from external code.
    pub fn handle(&self) -> WorkflowHandle {
        self.handle.clone()
    }

    /// Run one user turn: prior history plus `user_text` in, final state out.
    ///
    /// Returns `Err` only when the model call itself fails; that error is
    /// fatal to the turn and is never auto-retried. All execution failures
    /// are resolved inside the loop and reported through the outcome and
    /// the returned state (`last_error`, `last_code`).
    pub async fn run_turn(
        &self,
        history: Vec<Message>,
        user_text: &str,
    ) -> Result<(RunOutcome, TurnState)> {
        self.handle.reset();
        let cancel = self.handle.current_token();
        let mut state = TurnState::new(history, user_text);
        let _ = self.event_tx.send(WorkflowEvent::RunStart);

        let result = self.drive(&mut state, &cancel).await;

        self.handle.finish();
        if let Ok(outcome) = &result {
            let _ = self.event_tx.send(WorkflowEvent::RunEnd { outcome: *outcome });
        }
        result.map(|outcome| (outcome, state))
    }

    async fn drive(
        &self,
        state: &mut TurnState,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let mut phase = Phase::Generating;
        let mut attempt: u32 = 1;

        loop {
            phase = match phase {
                Phase::Generating => {
                    let _ = self
                        .event_tx
                        .send(WorkflowEvent::GenerationStart { attempt });
                    let reply = tokio::select! {
                        _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
                        reply = self.client.invoke(&state.messages) => reply?,
                    };
                    let _ = self.event_tx.send(WorkflowEvent::GenerationEnd {
                        message: reply.clone(),
                    });
                    state.push(reply);
                    state.last_error = None;
                    Phase::Executing
                }

                Phase::Executing => {
                    let reply_text = state
                        .newest_assistant()
                        .map(|m| m.content.clone())
                        .unwrap_or_default();

                    match extractor::extract_code(&reply_text) {
                        None => {
                            // "Model forgot to emit code" takes the same
                            // repair path as an execution failure.
                            let error = format!(
                                "the reply did not contain a usable code block:\n{}",
                                truncate_chars(&reply_text, self.config.reply_excerpt)
                            );
                            self.route_failure(state, None, error)
                        }
                        Some(code) => {
                            let _ = self
                                .event_tx
                                .send(WorkflowEvent::ExecutionStart { attempt });
                            let outcome = self.sandbox.execute(&code, cancel.clone()).await;
                            let _ = self.event_tx.send(WorkflowEvent::ExecutionEnd {
                                success: outcome.success,
                                output_path: outcome.output_path.clone(),
                                error: outcome.error_text(),
                            });

                            if outcome.is_cancelled() {
                                state.last_code = Some(code);
                                return Ok(RunOutcome::Cancelled);
                            }
                            if outcome.success {
                                state.record_success(code, outcome.output_path);
                                Phase::Done(RunOutcome::Success)
                            } else {
                                let error = outcome
                                    .error_text()
                                    .unwrap_or_else(|| "unknown error".to_string());
                                self.route_failure(state, Some(code), error)
                            }
                        }
                    }
                }

                Phase::Repairing => {
                    let error = state
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_string());
                    let _ = self.event_tx.send(WorkflowEvent::RepairRequested {
                        retry_count: state.retry_count,
                        error: error.clone(),
                    });
                    state.push(Message::user(repair_message(&error)));
                    attempt += 1;
                    Phase::Generating
                }

                Phase::Done(outcome) => return Ok(outcome),
            };
        }
    }

    /// Record a failure and route to repair or terminal failure.
    ///
    /// The ceiling check runs after the increment: with `max_repairs = 2`
    /// a turn makes at most 3 execution attempts. This exact boundary is
    /// load-bearing for compatibility.
    fn route_failure(&self, state: &mut TurnState, code: Option<String>, error: String) -> Phase {
        let error = truncate_chars(&error, self.config.error_excerpt);
        let retries = state.record_failure(code, error);
        if retries <= self.config.max_repairs {
            Phase::Repairing
        } else {
            Phase::Done(RunOutcome::Failure)
        }
    }
}

fn repair_message(error: &str) -> String {
    format!(
        "The code failed to execute:\n{}\n\n\
         Fix the problem and reply with the complete corrected TypeScript code block.",
        error
    )
}

/// Truncate to `max` characters on char boundaries, appending "..." if cut.
fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
