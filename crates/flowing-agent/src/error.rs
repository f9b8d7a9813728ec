//! Error types for flowing-agent

use thiserror::Error;

/// Result type alias using flowing-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort a run.
///
/// Recoverable failures (extraction, execution, timeout) are routed through
/// the repair path as data and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// The model call itself failed (network, auth, rate limit).
    /// Propagated to the caller unmodified and never auto-retried.
    #[error(transparent)]
    Model(#[from] flowing_ai::Error),
}
