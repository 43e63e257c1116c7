// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classification service ("the Oracle") adapters
//!
//! Providers differ only in how a system + user prompt pair is sent and how
//! the reply text is pulled out of the response. Prompt construction and
//! reply parsing are shared by [`PromptOracle`].

pub mod claude;
pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::catalog::{Entry, Folder};
use crate::config::{AppConfig, Language, ProviderKind};
use crate::Result;

/// One classification returned for an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleSuggestion {
    pub entry_id: String,
    pub suggested_folder: String,
    pub is_new_folder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// One folder proposed by category planning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPlanItem {
    pub path: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_count: Option<u32>,
}

/// Result of a connectivity check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub ok: bool,
    pub message: String,
}

/// AI-backed classification
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Suggest a folder for each entry; fails on transport or parse errors
    async fn analyze_batch(
        &self,
        entries: &[Entry],
        known_folders: &[Folder],
        confirmed_categories: Option<&[String]>,
    ) -> Result<Vec<OracleSuggestion>>;

    /// Propose a folder layout covering all entries
    async fn plan_categories(
        &self,
        entries: &[Entry],
        known_folders: &[Folder],
    ) -> Result<Vec<CategoryPlanItem>>;

    async fn test_connection(&self) -> ConnectionStatus;
}

/// Transport for a single prompt/reply exchange
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String>;

    async fn test_connection(&self) -> ConnectionStatus;
}

const ANALYZE_TEMPERATURE: f32 = 0.2;
const PLAN_TEMPERATURE: f32 = 0.3;

/// Oracle built from any [`Completion`] transport
pub struct PromptOracle<C> {
    transport: C,
    language: Language,
}

impl<C: Completion> PromptOracle<C> {
    pub fn new(transport: C, language: Language) -> Self {
        Self { transport, language }
    }
}

#[async_trait]
impl<C: Completion> Oracle for PromptOracle<C> {
    async fn analyze_batch(
        &self,
        entries: &[Entry],
        known_folders: &[Folder],
        confirmed_categories: Option<&[String]>,
    ) -> Result<Vec<OracleSuggestion>> {
        let system = prompt::analysis_system_prompt(known_folders, self.language, confirmed_categories);
        let user = prompt::analysis_user_prompt(entries);
        debug!("Classifying {} entries", entries.len());
        let raw = self.transport.complete(&system, &user, ANALYZE_TEMPERATURE).await?;
        prompt::parse_analysis_response(&raw)
    }

    async fn plan_categories(
        &self,
        entries: &[Entry],
        known_folders: &[Folder],
    ) -> Result<Vec<CategoryPlanItem>> {
        let system = prompt::plan_system_prompt(known_folders, self.language);
        let user = prompt::plan_user_prompt(entries);
        let raw = self.transport.complete(&system, &user, PLAN_TEMPERATURE).await?;
        prompt::parse_plan_response(&raw)
    }

    async fn test_connection(&self) -> ConnectionStatus {
        self.transport.test_connection().await
    }
}

/// Builds an Oracle from a configuration snapshot
pub trait OracleFactory: Send + Sync {
    fn build(&self, config: &AppConfig) -> Result<Arc<dyn Oracle>>;
}

/// Factory for the real HTTP providers
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpOracleFactory;

impl OracleFactory for HttpOracleFactory {
    fn build(&self, config: &AppConfig) -> Result<Arc<dyn Oracle>> {
        create_oracle(config)
    }
}

/// Oracle for the active provider of `config`
pub fn create_oracle(config: &AppConfig) -> Result<Arc<dyn Oracle>> {
    let provider = config.active_provider()?;
    let timeout = Duration::from_secs(config.timeout_secs);
    let oracle: Arc<dyn Oracle> = match provider.provider {
        ProviderKind::Claude => Arc::new(PromptOracle::new(
            claude::ClaudeClient::new(&provider, timeout)?,
            config.language,
        )),
        ProviderKind::OpenAi | ProviderKind::Ollama | ProviderKind::Custom => Arc::new(
            PromptOracle::new(openai::ChatClient::new(&provider, timeout)?, config.language),
        ),
    };
    Ok(oracle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarksortError;

    struct Canned(&'static str);

    #[async_trait]
    impl Completion for Canned {
        async fn complete(&self, _system: &str, _user: &str, _t: f32) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn test_connection(&self) -> ConnectionStatus {
            ConnectionStatus {
                ok: true,
                message: "ok".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn prompt_oracle_parses_fenced_reply() {
        let oracle = PromptOracle::new(
            Canned("Sure!\n```json\n[{\"id\": 7, \"suggestedFolder\": \"Dev\", \"isNewFolder\": false}]\n```"),
            Language::En,
        );
        let out = oracle.analyze_batch(&[], &[], None).await.unwrap();
        assert_eq!(out[0].entry_id, "7");
        assert_eq!(out[0].suggested_folder, "Dev");
    }

    #[tokio::test]
    async fn prompt_oracle_rejects_reply_without_array() {
        let oracle = PromptOracle::new(Canned("I cannot help with that."), Language::En);
        let err = oracle.plan_categories(&[], &[]).await.unwrap_err();
        assert!(matches!(err, MarksortError::Oracle(_)));
    }

    #[test]
    fn factory_refuses_unconfigured_provider() {
        let mut config = AppConfig::default();
        config.ai_provider.active_provider = ProviderKind::Custom;
        assert!(matches!(
            HttpOracleFactory.build(&config),
            Err(MarksortError::ConfigMissing(_))
        ));
    }
}
