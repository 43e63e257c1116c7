// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! OpenAI-compatible chat completions client
//!
//! Also serves Ollama (through its `/v1` endpoint) and custom
//! OpenAI-compatible servers.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Completion, ConnectionStatus};
use crate::config::{ProviderConfig, ProviderKind};
use crate::{MarksortError, Result};

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat client for OpenAI, Ollama and custom endpoints
pub struct ChatClient {
    client: Client,
    kind: ProviderKind,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Error message from a failed response: the body's `error.message`, else `HTTP <status>`
pub(super) async fn error_from_response(response: Response) -> MarksortError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
    MarksortError::Oracle(message)
}

impl ChatClient {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let api_key = if config.api_key.is_empty() && config.provider == ProviderKind::Ollama {
            "ollama".to_string()
        } else {
            config.api_key.clone()
        };

        Ok(Self {
            client,
            kind: config.provider,
            base_url: config.effective_base_url(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens_per_batch,
        })
    }

    /// List the models the endpoint offers
    pub async fn list_models(&self) -> Result<Vec<String>> {
        if self.kind == ProviderKind::Ollama {
            let url = format!("{}/api/tags", self.base_url.trim_end_matches("/v1"));
            let response = self.client.get(&url).timeout(CHECK_TIMEOUT).send().await?;
            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }
            let tags: TagsResponse = response.json().await?;
            return Ok(tags.models.into_iter().map(|m| m.name).collect());
        }

        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(CHECK_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: serde_json::Value = response.json().await?;
        Ok(body
            .get("data")
            .and_then(|d| d.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(|id| id.as_str()).map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Completion for ChatClient {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending request to {}: model={}", self.kind, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!("{} request failed: {}", self.kind, err);
            return Err(err);
        }

        let result: ChatResponse = response.json().await?;
        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn test_connection(&self) -> ConnectionStatus {
        match self.list_models().await {
            Ok(models) if self.kind == ProviderKind::Ollama => ConnectionStatus {
                ok: true,
                message: format!("Connected. {} model(s) available", models.len()),
            },
            Ok(_) => ConnectionStatus {
                ok: true,
                message: "Connected".to_string(),
            },
            Err(e) => ConnectionStatus {
                ok: false,
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(kind: ProviderKind, base: &str) -> ProviderConfig {
        ProviderConfig {
            provider: kind,
            api_key: "sk-test".to_string(),
            base_url: base.to_string(),
            model: "gpt-test".to_string(),
            max_tokens_per_batch: 500,
        }
    }

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "[]"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(
            &config(ProviderKind::OpenAi, &format!("{}/v1/", server.uri())),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.complete("sys", "user", 0.2).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn error_body_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let client = ChatClient::new(&config(ProviderKind::Custom, &server.uri()), Duration::from_secs(5)).unwrap();
        let err = client.complete("s", "u", 0.2).await.unwrap_err();
        assert_eq!(err.to_string(), "Incorrect API key provided");
    }

    #[tokio::test]
    async fn plain_failure_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = ChatClient::new(&config(ProviderKind::Custom, &server.uri()), Duration::from_secs(5)).unwrap();
        let err = client.complete("s", "u", 0.2).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[tokio::test]
    async fn ollama_connection_check_uses_tags_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3.2:latest"}, {"name": "qwen2.5:7b"}]
            })))
            .mount(&server)
            .await;

        let client = ChatClient::new(
            &config(ProviderKind::Ollama, &format!("{}/v1", server.uri())),
            Duration::from_secs(5),
        )
        .unwrap();
        let status = client.test_connection().await;
        assert!(status.ok);
        assert_eq!(status.message, "Connected. 2 model(s) available");
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_connection_check() {
        let client = ChatClient::new(
            &config(ProviderKind::OpenAi, "http://127.0.0.1:9"),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(!client.test_connection().await.ok);
    }
}
