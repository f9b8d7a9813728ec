//! flowing-ai: LLM client abstraction for the flowing diagram agent
//!
//! This crate provides a common `ModelClient` interface plus concrete
//! non-streaming clients for the Anthropic Messages API and for
//! OpenAI-compatible chat-completions endpoints (DashScope, custom).

pub mod client;
pub mod error;
pub mod providers;
pub mod types;

pub use client::ModelClient;
pub use error::{Error, Result};
pub use providers::{AnthropicClient, OpenAiCompatClient};
pub use types::{Message, Role};
