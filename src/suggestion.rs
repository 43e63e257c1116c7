// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Proposed entry → folder assignments

use serde::{Deserialize, Serialize};

use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    Move,
    NewFolder,
    NoChange,
}

impl ChangeType {
    /// no-change when the suggestion is empty or names the current location
    pub fn derive(current_path: &str, suggested_path: &str, is_new_folder: bool) -> Self {
        if paths::normalize_path(suggested_path).is_empty()
            || paths::same_location(current_path, suggested_path)
        {
            ChangeType::NoChange
        } else if is_new_folder {
            ChangeType::NewFolder
        } else {
            ChangeType::Move
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Modified,
}

impl SuggestionStatus {
    /// Accepted and modified suggestions are applied by the organizer
    pub fn is_applied(self) -> bool {
        matches!(self, SuggestionStatus::Accepted | SuggestionStatus::Modified)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub entry_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub current_folder_path: String,
    pub suggested_folder_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_folder_id: Option<String>,
    #[serde(default)]
    pub is_new_folder: bool,
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: SuggestionStatus,
}

impl Suggestion {
    /// Recompute `change_type` after the target changed
    pub fn refresh_change_type(&mut self) {
        self.change_type = ChangeType::derive(
            &self.current_folder_path,
            &self.suggested_folder_path,
            self.is_new_folder,
        );
    }

    /// Point the suggestion somewhere else and mark it modified
    pub fn modify(&mut self, folder_path: &str) {
        self.suggested_folder_path = folder_path.to_string();
        self.suggested_folder_id = None;
        self.status = SuggestionStatus::Modified;
        self.refresh_change_type();
    }
}
