// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for marksort
//!
//! The core never holds on to configuration. Each analysis run and each
//! auto-classify event asks a [`ConfigSource`] for a fresh snapshot.

mod provider;

pub use provider::{
    migrate, LegacyProvider, MultiProvider, ProviderConfig, ProviderKind, ProviderSection,
    ProvidersConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::rules::Rule;
use crate::{MarksortError, Result};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Language used for folder names proposed by the Oracle
    #[serde(default)]
    pub language: Language,

    /// Classification service credentials, migrated from the legacy shape at load
    #[serde(default, alias = "aiProvider")]
    pub ai_provider: ProvidersConfig,

    /// Per-request timeout for the classification service
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default, alias = "autoClassify")]
    pub auto_classify: AutoClassifyConfig,

    #[serde(default)]
    pub organize: OrganizeConfig,

    /// User rules; list position is priority
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Control server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Bookmark tree snapshot location
    #[serde(default)]
    pub tree: TreeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AutoClassifyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Move without asking instead of notifying the observer
    #[serde(default, alias = "silentMode")]
    pub silent_mode: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OrganizeConfig {
    #[serde(default = "default_batch_size", alias = "batchSize")]
    pub batch_size: usize,
    #[serde(default = "default_true", alias = "includeReason")]
    pub include_reason: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TreeConfig {
    #[serde(default = "default_tree_path")]
    pub path: String,
}

// Default value functions
fn default_timeout() -> u64 { 120 }
fn default_true() -> bool { true }
fn default_batch_size() -> usize { 30 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_tree_path() -> String { "bookmarks.json".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            ai_provider: ProvidersConfig::default(),
            timeout_secs: default_timeout(),
            auto_classify: AutoClassifyConfig::default(),
            organize: OrganizeConfig::default(),
            rules: Vec::new(),
            server: ServerConfig::default(),
            tree: TreeConfig::default(),
        }
    }
}

impl Default for AutoClassifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            silent_mode: false,
        }
    }
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            include_reason: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            path: default_tree_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| MarksortError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Credentials of the active provider, if usable
    pub fn active_provider(&self) -> Result<ProviderConfig> {
        let provider = self.ai_provider.active();
        if provider.model.trim().is_empty() {
            return Err(MarksortError::ConfigMissing(format!(
                "No model configured for provider '{}'. Please configure your AI provider first.",
                provider.provider
            )));
        }
        if provider.effective_base_url().is_empty() {
            return Err(MarksortError::ConfigMissing(format!(
                "No base URL configured for provider '{}'.",
                provider.provider
            )));
        }
        Ok(provider)
    }

    /// Batch size with a floor of one
    pub fn batch_size(&self) -> usize {
        self.organize.batch_size.max(1)
    }

    /// Append a rule at the lowest priority
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Apply `edit` to the rule with `id`; false when no such rule
    pub fn update_rule(&mut self, id: &str, edit: impl FnOnce(&mut Rule)) -> bool {
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                edit(rule);
                true
            }
            None => false,
        }
    }

    pub fn delete_rule(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        self.rules.len() != before
    }

    /// Reorder rules to match `ids`; unknown ids are ignored and rules not
    /// listed keep their relative order at the end
    pub fn reorder_rules(&mut self, ids: &[String]) {
        let mut remaining = std::mem::take(&mut self.rules);
        let mut ordered = Vec::with_capacity(remaining.len());
        for id in ids {
            if let Some(pos) = remaining.iter().position(|r| &r.id == id) {
                ordered.push(remaining.remove(pos));
            }
        }
        ordered.extend(remaining);
        self.rules = ordered;
    }
}

/// Supplies a fresh configuration snapshot on every call
pub trait ConfigSource: Send + Sync {
    /// `None` when no settings exist
    fn snapshot(&self) -> Option<AppConfig>;
}

/// Reads the config file on every snapshot
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for ConfigFile {
    fn snapshot(&self) -> Option<AppConfig> {
        if !self.path.exists() {
            return None;
        }
        match AppConfig::load(&self.path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring unreadable config {:?}: {}", self.path, e);
                None
            }
        }
    }
}

/// In-memory settings, replaceable at runtime
#[derive(Default)]
pub struct StaticConfig {
    config: Mutex<Option<AppConfig>>,
}

impl StaticConfig {
    pub fn new(config: Option<AppConfig>) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    pub fn set(&self, config: Option<AppConfig>) {
        *self.config.lock().unwrap_or_else(|p| p.into_inner()) = config;
    }
}

impl ConfigSource for StaticConfig {
    fn snapshot(&self) -> Option<AppConfig> {
        self.config.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}
