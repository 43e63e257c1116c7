// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classification provider settings
//!
//! Older config files carry a single provider block
//! (`{"provider": "openai", "api_key": ..}`); newer ones keep one block per
//! provider plus the active choice. Both shapes deserialize into
//! [`ProviderSection`] and are folded into [`ProvidersConfig`] by [`migrate`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Claude,
    Ollama,
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Claude,
        ProviderKind::Ollama,
        ProviderKind::Custom,
    ];

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Claude => "https://api.anthropic.com",
            ProviderKind::Ollama => "http://localhost:11434/v1",
            ProviderKind::Custom => "",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Claude => "claude-3-5-sonnet-20241022",
            ProviderKind::Ollama => "llama3.2",
            ProviderKind::Custom => "",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Credentials and model for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    #[serde(default, alias = "apiKey")]
    pub api_key: String,
    #[serde(default, alias = "baseUrl")]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_tokens", alias = "maxTokensPerBatch")]
    pub max_tokens_per_batch: u32,
}

fn default_max_tokens() -> u32 { 4000 }

impl ProviderConfig {
    pub fn defaults_for(provider: ProviderKind) -> Self {
        Self {
            provider,
            api_key: String::new(),
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            max_tokens_per_batch: default_max_tokens(),
        }
    }

    /// Configured base url, falling back to the provider default, no trailing slash
    pub fn effective_base_url(&self) -> String {
        let url = if self.base_url.trim().is_empty() {
            self.provider.default_base_url()
        } else {
            self.base_url.trim()
        };
        url.trim_end_matches('/').to_string()
    }
}

/// Single-provider block used by older config files
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyProvider {
    pub provider: ProviderKind,
    #[serde(default, alias = "apiKey")]
    pub api_key: String,
    #[serde(default, alias = "baseUrl")]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, alias = "maxTokensPerBatch")]
    pub max_tokens_per_batch: Option<u32>,
}

/// Per-provider block
#[derive(Debug, Clone, Deserialize)]
pub struct MultiProvider {
    #[serde(alias = "activeProvider")]
    pub active_provider: ProviderKind,
    #[serde(default)]
    pub configs: BTreeMap<ProviderKind, ProviderConfig>,
}

/// Either shape found on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderSection {
    Multi(MultiProvider),
    Legacy(LegacyProvider),
}

/// Migrated provider settings: one config per provider plus the active one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProviderSection")]
pub struct ProvidersConfig {
    pub active_provider: ProviderKind,
    pub configs: BTreeMap<ProviderKind, ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            active_provider: ProviderKind::OpenAi,
            configs: default_configs(),
        }
    }
}

impl ProvidersConfig {
    pub fn active(&self) -> ProviderConfig {
        self.configs
            .get(&self.active_provider)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::defaults_for(self.active_provider))
    }
}

impl From<ProviderSection> for ProvidersConfig {
    fn from(section: ProviderSection) -> Self {
        migrate(section)
    }
}

fn default_configs() -> BTreeMap<ProviderKind, ProviderConfig> {
    ProviderKind::ALL
        .iter()
        .map(|k| (*k, ProviderConfig::defaults_for(*k)))
        .collect()
}

/// Fold either on-disk shape into the per-provider form
pub fn migrate(section: ProviderSection) -> ProvidersConfig {
    let mut configs = default_configs();
    match section {
        ProviderSection::Multi(multi) => {
            configs.extend(multi.configs);
            ProvidersConfig {
                active_provider: multi.active_provider,
                configs,
            }
        }
        ProviderSection::Legacy(legacy) => {
            tracing::info!("Migrating legacy provider settings for '{}'", legacy.provider);
            let base_url = if legacy.base_url.is_empty() {
                legacy.provider.default_base_url().to_string()
            } else {
                legacy.base_url
            };
            configs.insert(
                legacy.provider,
                ProviderConfig {
                    provider: legacy.provider,
                    api_key: legacy.api_key,
                    base_url,
                    model: legacy.model,
                    max_tokens_per_batch: legacy.max_tokens_per_batch.unwrap_or_else(default_max_tokens),
                },
            );
            ProvidersConfig {
                active_provider: legacy.provider,
                configs,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_shape_is_migrated() {
        let raw = r#"{"provider": "claude", "apiKey": "sk-1", "model": "claude-x"}"#;
        let providers: ProvidersConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(providers.active_provider, ProviderKind::Claude);
        let active = providers.active();
        assert_eq!(active.api_key, "sk-1");
        assert_eq!(active.base_url, "https://api.anthropic.com");
        assert_eq!(active.max_tokens_per_batch, 4000);
        assert_eq!(providers.configs.len(), 4);
    }

    #[test]
    fn multi_shape_fills_missing_providers() {
        let raw = r#"{
            "active_provider": "ollama",
            "configs": {"ollama": {"provider": "ollama", "model": "qwen2.5"}}
        }"#;
        let providers: ProvidersConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(providers.active().model, "qwen2.5");
        assert_eq!(providers.active().effective_base_url(), "http://localhost:11434/v1");
        assert_eq!(providers.configs[&ProviderKind::OpenAi].model, "gpt-4o-mini");
    }

    #[test]
    fn serialized_form_reloads_unchanged() {
        let providers = ProvidersConfig::default();
        let json = serde_json::to_string(&providers).unwrap();
        let back: ProvidersConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, providers);
    }
}
