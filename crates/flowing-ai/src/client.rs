//! The model-client seam between the orchestrator and the provider layer

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Message;

/// A handle to a ready-to-invoke language model.
///
/// One call sends the full ordered message sequence and returns the single
/// assistant reply. Transport and auth failures surface as [`crate::Error`];
/// the caller decides whether they are fatal (the workflow treats them as
/// fatal to the current turn and never retries them).
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> Result<Message>;
}
