// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! User rules: URL pattern → target folder
//!
//! Rules are evaluated in list order and the first match wins. Matching never
//! fails: a bad pattern or an unparseable url is simply a non-match.

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::suggestion::Suggestion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Domain,
    Wildcard,
    Regex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub match_type: MatchType,
    pub pattern: String,
    pub target_folder_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_folder_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// New enabled rule with a fresh id
    pub fn new(
        name: impl Into<String>,
        match_type: MatchType,
        pattern: impl Into<String>,
        target_folder_path: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            match_type,
            pattern: pattern.into(),
            target_folder_path: target_folder_path.into(),
            target_folder_id: None,
            enabled: true,
            created_at: Utc::now(),
        }
    }
}

/// Host of a url without a leading `www.`; empty when the url does not parse
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h).to_string()))
        .unwrap_or_default()
}

pub fn matches_rule(url: &str, rule: &Rule) -> bool {
    if !rule.enabled {
        return false;
    }
    let pattern = rule.pattern.trim();

    match rule.match_type {
        MatchType::Domain => {
            let domain = extract_domain(url);
            let base = pattern.strip_prefix("www.").unwrap_or(pattern);
            if domain.is_empty() || base.is_empty() {
                return false;
            }
            domain.eq_ignore_ascii_case(base)
                || domain
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", base.to_ascii_lowercase()))
        }
        MatchType::Wildcard => {
            let escaped = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            match RegexBuilder::new(&format!("^{}$", escaped))
                .case_insensitive(true)
                .build()
            {
                Ok(re) => re.is_match(&extract_domain(url)) || re.is_match(url),
                Err(e) => {
                    debug!("Skipping wildcard rule '{}': {}", rule.name, e);
                    false
                }
            }
        }
        MatchType::Regex => match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re.is_match(url),
            Err(e) => {
                debug!("Skipping regex rule '{}': {}", rule.name, e);
                false
            }
        },
    }
}

/// First matching rule in list order
pub fn find_matching_rule<'a>(url: &str, rules: &'a [Rule]) -> Option<&'a Rule> {
    rules.iter().find(|rule| matches_rule(url, rule))
}

/// Override suggestions whose url matches a rule
pub fn apply_rules(suggestions: Vec<Suggestion>, rules: &[Rule]) -> Vec<Suggestion> {
    suggestions
        .into_iter()
        .map(|mut s| {
            if let Some(rule) = find_matching_rule(&s.url, rules) {
                s.suggested_folder_path = rule.target_folder_path.clone();
                s.suggested_folder_id = rule.target_folder_id.clone();
                s.is_new_folder = false;
                s.reason = Some(format!("Rule: {}", rule.name));
                s.refresh_change_type();
            }
            s
        })
        .collect()
}
