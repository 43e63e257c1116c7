// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Prompt construction and reply parsing

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::{CategoryPlanItem, OracleSuggestion};
use crate::catalog::{Entry, Folder};
use crate::config::Language;
use crate::paths;
use crate::rules::extract_domain;
use crate::{MarksortError, Result};

const PLAN_TOP_DOMAINS: usize = 30;
const PLAN_SAMPLES: usize = 50;

/// Existing folder paths, root-stripped and deduplicated case-insensitively
fn folder_listing(folders: &[Folder]) -> String {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for folder in folders {
        let display = paths::strip_root_prefix(&folder.path);
        if display.is_empty() {
            continue;
        }
        if seen.insert(display.to_lowercase()) {
            lines.push(format!("  - {}", display));
        }
    }
    if lines.is_empty() {
        "  (no folders yet)".to_string()
    } else {
        lines.join("\n")
    }
}

fn language_rule(language: Language) -> &'static str {
    match language {
        Language::En => "Use English for folder names.",
        Language::Zh => "Use Chinese for folder names unless the field conventionally uses an English name (GitHub, Docker, AI).",
    }
}

fn reason_language(language: Language) -> &'static str {
    match language {
        Language::En => "English",
        Language::Zh => "Chinese",
    }
}

pub fn analysis_system_prompt(
    known_folders: &[Folder],
    language: Language,
    confirmed_categories: Option<&[String]>,
) -> String {
    if let Some(confirmed) = confirmed_categories.filter(|c| !c.is_empty()) {
        let approved = confirmed
            .iter()
            .map(|c| format!("  - {}", c))
            .collect::<Vec<_>>()
            .join("\n");
        return format!(
            "You are a bookmark organization assistant. Assign each bookmark to the best matching folder from the APPROVED list below.\n\n\
             APPROVED FOLDERS (use one of these, never invent a new folder):\n{approved}\n\n\
             Rules:\n\
             1. Every bookmark MUST go to one of the approved folders.\n\
             2. Use \"/\" as path separator. Do not include root folder names such as \"Bookmarks Bar\".\n\
             3. If nothing fits perfectly, choose the closest approved folder.\n\
             4. {lang}\n\
             5. Set \"isNewFolder\" to false for every item.\n\
             6. Respond ONLY with a valid JSON array, no explanation text.\n\
             7. Each item: {{ \"id\": string, \"suggestedFolder\": string, \"isNewFolder\": false, \"reason\": string (brief, in {reason}) }}",
            lang = language_rule(language),
            reason = reason_language(language),
        );
    }

    format!(
        "You are a bookmark organization assistant. Suggest the best folder for each bookmark.\n\n\
         Existing folder structure:\n{folders}\n\n\
         Rules:\n\
         1. Strongly prefer existing folders and reuse their names exactly. Never create a near-duplicate (\"AI Tools\" when \"AI\" exists).\n\
         2. Only create a new folder when no existing folder can hold the bookmark.\n\
         3. Use \"/\" as path separator (e.g. \"Dev/GitHub\"). Do not include root folder names such as \"Bookmarks Bar\" or \"Other Bookmarks\".\n\
         4. Keep the hierarchy 1-2 levels deep.\n\
         5. {lang}\n\
         6. Group similar bookmarks in broad categories: Dev, Design, Tools, Learning, Entertainment, News, Social, Shopping, Finance.\n\
         7. Respond ONLY with a valid JSON array, no explanation text.\n\
         8. Each item: {{ \"id\": string, \"suggestedFolder\": string, \"isNewFolder\": boolean, \"reason\": string (brief, in {reason}) }}",
        folders = folder_listing(known_folders),
        lang = language_rule(language),
        reason = reason_language(language),
    )
}

pub fn analysis_user_prompt(entries: &[Entry]) -> String {
    let list = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "{}. id=\"{}\" title=\"{}\" url=\"{}\" currentFolder=\"{}\"",
                i + 1,
                e.id,
                e.title,
                e.url,
                e.current_folder_path
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Categorize the following bookmarks:\n{}\n\nRespond with a JSON array only.", list)
}

pub fn plan_system_prompt(known_folders: &[Folder], language: Language) -> String {
    format!(
        "You are a bookmark organization planner. Analyze the bookmarks and propose a clean folder structure.\n\n\
         Current folder structure (keep, merge or replace as needed):\n{folders}\n\n\
         Rules:\n\
         1. Propose 8-20 folder paths that can hold ALL the bookmarks.\n\
         2. Use \"/\" as path separator and keep the hierarchy at most 2 levels deep.\n\
         3. Merge similar or overlapping existing folders and drop near-duplicates.\n\
         4. Do not include root folder names such as \"Bookmarks Bar\" or \"Other Bookmarks\".\n\
         5. {lang}\n\
         6. Think in broad practical categories; use sub-folders such as \"Dev/Frontend\" only when an area is large.\n\
         7. Give a brief description and an estimated bookmark count for each category.\n\
         8. Respond ONLY with a valid JSON array:\n   [{{ \"path\": string, \"description\": string, \"estimatedCount\": number }}]",
        folders = folder_listing(known_folders),
        lang = language_rule(language),
    )
}

/// Summary of the working set: top domains, folder distribution, samples
pub fn plan_user_prompt(entries: &[Entry]) -> String {
    let mut domains: HashMap<String, usize> = HashMap::new();
    let mut folders: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        let domain = extract_domain(&entry.url);
        if !domain.is_empty() {
            *domains.entry(domain).or_default() += 1;
        }
        let folder = if entry.current_folder_path.is_empty() {
            "(root)"
        } else {
            entry.current_folder_path.as_str()
        };
        *folders.entry(folder).or_default() += 1;
    }

    let top_domains = ranked(domains.into_iter().collect())
        .into_iter()
        .take(PLAN_TOP_DOMAINS)
        .map(|(d, n)| format!("  {}: {}", d, n))
        .collect::<Vec<_>>()
        .join("\n");
    let distribution = ranked(folders.into_iter().map(|(f, n)| (f.to_string(), n)).collect())
        .into_iter()
        .map(|(f, n)| format!("  {}: {}", f, n))
        .collect::<Vec<_>>()
        .join("\n");
    let samples = entries
        .iter()
        .take(PLAN_SAMPLES)
        .map(|e| {
            let host = url::Url::parse(&e.url)
                .ok()
                .and_then(|u| u.host_str().map(String::from))
                .unwrap_or_else(|| e.url.clone());
            format!("  - {} ({})", e.title, host)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "I have {} bookmarks in total. Please propose a folder structure.\n\n\
         Top domains:\n{}\n\n\
         Current folder distribution:\n{}\n\n\
         Sample bookmarks:\n{}\n\n\
         Respond with a JSON array of proposed categories.",
        entries.len(),
        top_domains,
        distribution,
        samples
    )
}

/// Count descending, then name for a stable order
fn ranked(mut counts: Vec<(String, usize)>) -> Vec<(String, usize)> {
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Span from the first `[` to the last `]`, parsed as a JSON array
pub fn extract_json_array(raw: &str) -> Result<Vec<Value>> {
    let start = raw.find('[');
    let end = raw.rfind(']');
    let slice = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => return Err(MarksortError::Oracle("No JSON array found in AI response".to_string())),
    };
    match serde_json::from_str::<Value>(slice) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(MarksortError::Oracle("AI response is not an array".to_string())),
        Err(e) => Err(MarksortError::Oracle(format!("Invalid JSON in AI response: {}", e))),
    }
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

pub fn parse_analysis_response(raw: &str) -> Result<Vec<OracleSuggestion>> {
    Ok(extract_json_array(raw)?
        .iter()
        .map(|item| OracleSuggestion {
            entry_id: text_field(item, "id").unwrap_or_default(),
            suggested_folder: text_field(item, "suggestedFolder").unwrap_or_default(),
            is_new_folder: truthy(item.get("isNewFolder")),
            reason: text_field(item, "reason").filter(|r| !r.is_empty()),
            confidence: item.get("confidence").and_then(Value::as_f64),
        })
        .collect())
}

pub fn parse_plan_response(raw: &str) -> Result<Vec<CategoryPlanItem>> {
    Ok(extract_json_array(raw)?
        .iter()
        .map(|item| CategoryPlanItem {
            path: text_field(item, "path").unwrap_or_default(),
            description: text_field(item, "description").unwrap_or_default(),
            estimated_count: item
                .get("estimatedCount")
                .and_then(Value::as_f64)
                .filter(|n| *n > 0.0)
                .map(|n| n.round() as u32),
        })
        .collect())
}
