// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for marksort

use thiserror::Error;

/// Result type alias for marksort operations
pub type Result<T> = std::result::Result<T, MarksortError>;

/// marksort error types
#[derive(Error, Debug)]
pub enum MarksortError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// No settings or no usable provider configured
    #[error("{0}")]
    ConfigMissing(String),

    /// Network, HTTP or response-parse failure from the classification service
    #[error("{0}")]
    Oracle(String),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    /// Entry or folder disappeared between lookup and action
    #[error("{0} no longer exists")]
    EntityVanished(String),

    #[error("Failed to create folder \"{path}\": {reason}")]
    FolderCreate { path: String, reason: String },

    #[error("Tree store error: {0}")]
    Tree(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MarksortError {
    /// Message shown to an observer; drops the variant prefix where one exists.
    pub fn user_message(&self) -> String {
        match self {
            MarksortError::Tree(msg) | MarksortError::Config(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
