//! OpenAI-compatible chat-completions client (non-streaming)
//!
//! Used for Tongyi/DashScope and for custom endpoints that speak the
//! chat-completions dialect.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    client::ModelClient,
    error::{self, Error, Result},
    types::Message,
};

/// Client for any OpenAI-compatible endpoint
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl OpenAiCompatClient {
    /// Create a new client. `base_url` is the API root, e.g.
    /// `https://dashscope.aliyuncs.com/compatible-mode/v1`.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            temperature: Some(0.3),
            max_tokens: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Cap the response length
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(convert_message).collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        tracing::debug!(url = %url, model = %self.model, "chat-completions request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error::from_http_failure(status, &body));
        }

        let reply: ChatResponse = response.json().await?;
        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(Error::UnexpectedResponse(
                "reply contained no choices with content".to_string(),
            ));
        }
        Ok(Message::assistant(text))
    }
}

fn convert_message(message: &Message) -> ChatMessage {
    ChatMessage {
        role: message.role.as_str(),
        content: message.content.clone(),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_pass_through_inline() {
        let messages = vec![
            Message::system("sys"),
            Message::user("usr"),
            Message::assistant("asst"),
        ];
        let converted: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let roles: Vec<&str> = converted.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
    }

    #[test]
    fn test_empty_reply_is_rejected() {
        let reply: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(reply.choices.is_empty());
    }
}
