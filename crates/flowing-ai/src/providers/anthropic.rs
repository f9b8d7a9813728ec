//! Anthropic Messages API client (non-streaming)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    client::ModelClient,
    error::{self, Error, Result},
    types::{Message, Role},
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API client
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicClient {
    /// Create a new client for the given model.
    ///
    /// `api_key` may be a regular key or an OAuth access token
    /// (`sk-ant-oat...`); the auth headers are chosen accordingly.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            max_tokens: 4096,
            temperature: Some(0.3),
        }
    }

    /// Create from the `ANTHROPIC_API_KEY` environment variable
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key, model))
    }

    /// Override the base URL (testing, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn is_oauth(&self) -> bool {
        self.api_key.contains("sk-ant-oat")
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        if self.is_oauth() {
            if let Ok(value) = format!("Bearer {}", self.api_key).parse() {
                headers.insert("Authorization", value);
            }
            headers.insert("anthropic-beta", "oauth-2025-04-20".parse().unwrap());
        } else if let Ok(value) = self.api_key.parse() {
            headers.insert("x-api-key", value);
        }
        headers.insert("accept", "application/json".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("anthropic-version", ANTHROPIC_VERSION.parse().unwrap());
        headers
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        let request = build_request(
            &self.model,
            self.max_tokens,
            self.temperature,
            messages,
        );
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(url = %url, model = %self.model, "anthropic request");

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error::from_http_failure(status, &body));
        }

        let reply: MessagesResponse = response.json().await?;
        let text = reply
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(Error::UnexpectedResponse(
                "reply contained no text blocks".to_string(),
            ));
        }
        Ok(Message::assistant(text))
    }
}

/// Build the request body, lifting system-role messages into the `system`
/// field as the Messages API requires.
fn build_request(
    model: &str,
    max_tokens: u32,
    temperature: Option<f32>,
    messages: &[Message],
) -> MessagesRequest {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let api_messages = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| ApiMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
        })
        .collect();

    MessagesRequest {
        model: model.to_string(),
        max_tokens,
        temperature,
        system: if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        },
        messages: api_messages,
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_lifted_out() {
        let messages = vec![
            Message::system("you draw diagrams"),
            Message::user("draw a flowchart"),
            Message::assistant("```ts\n```"),
        ];
        let request = build_request("claude-sonnet-4-20250514", 4096, Some(0.3), &messages);
        assert_eq!(request.system.as_deref(), Some("you draw diagrams"));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[1].role, "assistant");
    }

    #[test]
    fn test_no_system_field_without_system_messages() {
        let messages = vec![Message::user("hi")];
        let request = build_request("claude-sonnet-4-20250514", 4096, None, &messages);
        assert!(request.system.is_none());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_oauth_key_detection() {
        let oauth = AnthropicClient::new("sk-ant-oat01-abc", "m");
        let plain = AnthropicClient::new("sk-ant-api03-abc", "m");
        assert!(oauth.is_oauth());
        assert!(!plain.is_oauth());
        assert!(oauth.headers().contains_key("Authorization"));
        assert!(plain.headers().contains_key("x-api-key"));
    }
}
