// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Anthropic Messages API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::openai::error_from_response;
use super::{Completion, ConnectionStatus};
use crate::config::ProviderConfig;
use crate::Result;

const API_VERSION: &str = "2023-06-01";

pub struct ClaudeClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl ClaudeClient {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.effective_base_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens_per_batch,
        })
    }

    async fn send(&self, system: &str, user: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: [UserMessage {
                role: "user",
                content: user,
            }],
            temperature,
        };

        debug!("Sending request to claude: model={}", self.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = error_from_response(response).await;
            warn!("claude request failed: {}", err);
            return Err(err);
        }

        let result: MessagesResponse = response.json().await?;
        Ok(result
            .content
            .into_iter()
            .next()
            .and_then(|b| b.text)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Completion for ClaudeClient {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        self.send(system, user, temperature, self.max_tokens).await
    }

    async fn test_connection(&self) -> ConnectionStatus {
        match self.send("Reply with OK.", "ping", 0.0, 10).await {
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
