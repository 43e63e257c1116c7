// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Applying accepted suggestions to the tree
//!
//! There is no transaction around the tree. Every step is recorded with its
//! outcome, failures are collected per item, and the run goes on.

pub mod cleanup;
pub mod resolver;

pub use cleanup::{cleanup_empty_folders, deduplicate_folders, CleanupReport, DedupeReport};
pub use resolver::{build_folder_cache, ensure_folder_path, resolve_folder_path, FolderCache};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::extract_folders;
use crate::paths;
use crate::suggestion::{ChangeType, Suggestion};
use crate::tree::{MoveDestination, TreeStore};
use crate::{MarksortError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    CreateFolder,
    Move,
    Dedupe,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum StepOutcome {
    Ok,
    Failed(String),
}

/// One tree mutation attempted during organize
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaStep {
    pub kind: StepKind,
    /// Folder path or entry title the step acted on
    pub subject: String,
    pub outcome: StepOutcome,
}

impl SagaStep {
    pub fn ok(kind: StepKind, subject: &str) -> Self {
        Self {
            kind,
            subject: subject.to_string(),
            outcome: StepOutcome::Ok,
        }
    }

    pub fn failed(kind: StepKind, subject: &str, message: &str) -> Self {
        Self {
            kind,
            subject: subject.to_string(),
            outcome: StepOutcome::Failed(message.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrganizeReport {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub merged: usize,
    pub cleaned: usize,
    pub steps: Vec<SagaStep>,
}

/// Apply accepted and modified suggestions.
///
/// Target folders are created first, then entries are moved, then duplicate
/// folders are merged and empty ones removed. Only the final cleanup is
/// allowed to fail silently.
pub async fn execute_organize(store: &dyn TreeStore, suggestions: &[Suggestion]) -> Result<OrganizeReport> {
    let applied: Vec<&Suggestion> = suggestions
        .iter()
        .filter(|s| s.status.is_applied() && s.change_type != ChangeType::NoChange)
        .collect();
    info!("Organizing {} accepted suggestions", applied.len());

    let mut report = OrganizeReport::default();
    let mut cache = build_folder_cache(store).await?;

    for s in &applied {
        let stripped = paths::strip_root_prefix(&s.suggested_folder_path);
        if stripped.is_empty() || cache.contains(&stripped) {
            continue;
        }
        match ensure_folder_path(store, &stripped, &mut cache).await {
            Ok(id) => {
                cache.insert(&stripped, &id);
                report.steps.push(SagaStep::ok(StepKind::CreateFolder, &stripped));
            }
            Err(e) => {
                let message = MarksortError::FolderCreate {
                    path: s.suggested_folder_path.clone(),
                    reason: e.user_message(),
                }
                .to_string();
                warn!("{}", message);
                report.steps.push(SagaStep::failed(StepKind::CreateFolder, &stripped, &message));
                report.errors.push(message);
            }
        }
    }

    for s in &applied {
        match move_suggestion(store, s, &cache).await {
            Ok(()) => {
                report.succeeded += 1;
                report.steps.push(SagaStep::ok(StepKind::Move, &s.title));
            }
            Err(e) => {
                let message = format!("Failed to move \"{}\": {}", s.title, e.user_message());
                warn!("{}", message);
                report.failed += 1;
                report.steps.push(SagaStep::failed(StepKind::Move, &s.title, &message));
                report.errors.push(message);
            }
        }
    }

    match deduplicate_folders(store).await {
        Ok(dedupe) => {
            report.merged = dedupe.merged;
            report.steps.extend(dedupe.steps);
            match cleanup_empty_folders(store).await {
                Ok(cleanup) => {
                    report.cleaned = cleanup.removed;
                    report.steps.extend(cleanup.steps);
                }
                Err(e) => debug!("Empty folder cleanup skipped: {}", e),
            }
        }
        Err(e) => debug!("Folder dedupe skipped: {}", e),
    }

    info!(
        "Organize finished: {} moved, {} failed, {} merged, {} cleaned",
        report.succeeded, report.failed, report.merged, report.cleaned
    );
    Ok(report)
}

async fn move_suggestion(store: &dyn TreeStore, s: &Suggestion, cache: &FolderCache) -> Result<()> {
    let target_path = paths::normalize_path(&s.suggested_folder_path);
    let stripped = paths::strip_root_prefix(&target_path);

    let target = match s
        .suggested_folder_id
        .clone()
        .or_else(|| cache.get(&stripped).map(String::from))
    {
        Some(id) => Some(id),
        None => resolve_folder_path(store, &target_path).await?,
    };
    let Some(target) = target else {
        return Err(MarksortError::Tree(format!(
            "Could not resolve target folder: {}",
            s.suggested_folder_path
        )));
    };

    if store.get(&s.entry_id).await.is_err() {
        return Err(MarksortError::EntityVanished("Entry".to_string()));
    }

    store
        .move_node(&s.entry_id, MoveDestination::into_folder(target))
        .await?;
    Ok(())
}

/// Move an entry into the existing folder whose root-stripped path matches
/// `folder_path`, ignoring case. Best-effort: returns whether it moved.
pub async fn move_to_folder(store: &dyn TreeStore, entry_id: &str, folder_path: &str) -> bool {
    let wanted = paths::path_key(folder_path);
    if wanted.is_empty() {
        return false;
    }
    let tree = match store.get_tree().await {
        Ok(tree) => tree,
        Err(e) => {
            debug!("move_to_folder: tree unavailable: {}", e);
            return false;
        }
    };
    let Some(folder) = extract_folders(&tree)
        .into_iter()
        .find(|f| paths::path_key(&f.path) == wanted)
    else {
        debug!("move_to_folder: no folder matches '{}'", folder_path);
        return false;
    };
    match store
        .move_node(entry_id, MoveDestination::into_folder(folder.id))
        .await
    {
        Ok(_) => true,
        Err(e) => {
            debug!("move_to_folder: move of {} failed: {}", entry_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggestion::SuggestionStatus;
    use crate::tree::{CreateDetails, MemoryTree, BAR_ID, OTHER_ID};

    async fn add(tree: &MemoryTree, parent: &str, title: &str, url: Option<&str>) -> String {
        tree.create(CreateDetails {
            parent_id: parent.to_string(),
            title: title.to_string(),
            url: url.map(String::from),
        })
        .await
        .unwrap()
        .id
    }

    fn accepted(entry_id: &str, title: &str, current: &str, target: &str) -> Suggestion {
        let mut s = Suggestion {
            entry_id: entry_id.to_string(),
            title: title.to_string(),
            url: String::new(),
            current_folder_path: current.to_string(),
            suggested_folder_path: target.to_string(),
            suggested_folder_id: None,
            is_new_folder: true,
            change_type: ChangeType::NoChange,
            reason: None,
            status: SuggestionStatus::Accepted,
        };
        s.refresh_change_type();
        s
    }

    #[tokio::test]
    async fn vanished_entry_is_a_per_item_failure() {
        let tree = MemoryTree::new();
        let kept = add(&tree, BAR_ID, "kept", Some("https://a.io")).await;
        let report = execute_organize(
            &tree,
            &[
                accepted("9999", "ghost", "Bookmarks bar", "News"),
                accepted(&kept, "kept", "Bookmarks bar", "News"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors, vec!["Failed to move \"ghost\": Entry no longer exists".to_string()]);
        assert!(report
            .steps
            .iter()
            .any(|s| s.kind == StepKind::Move && matches!(s.outcome, StepOutcome::Failed(_))));
    }

    #[tokio::test]
    async fn no_change_and_pending_are_skipped() {
        let tree = MemoryTree::new();
        let id = add(&tree, BAR_ID, "a", Some("https://a.io")).await;
        let mut pending = accepted(&id, "a", "Bookmarks bar", "Elsewhere");
        pending.status = SuggestionStatus::Pending;
        let same = accepted(&id, "a", "Bookmarks bar/Dev", "dev");
        assert_eq!(same.change_type, ChangeType::NoChange);

        let before = tree.get_tree().await.unwrap();
        let report = execute_organize(&tree, &[pending, same]).await.unwrap();
        assert_eq!(report.succeeded + report.failed, 0);
        assert_eq!(tree.get_tree().await.unwrap(), before);
    }

    #[tokio::test]
    async fn explicit_folder_id_wins() {
        let tree = MemoryTree::new();
        let target = add(&tree, BAR_ID, "Pinned", None).await;
        let id = add(&tree, OTHER_ID, "a", Some("https://a.io")).await;
        let mut s = accepted(&id, "a", "Other bookmarks", "Somewhere/Else");
        s.suggested_folder_id = Some(target.clone());

        let report = execute_organize(&tree, &[s]).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(tree.get(&id).await.unwrap().parent_id, Some(target));
    }

    #[tokio::test]
    async fn move_to_folder_matches_case_insensitively() {
        let tree = MemoryTree::new();
        let dev = add(&tree, BAR_ID, "Dev", None).await;
        let github = add(&tree, &dev, "GitHub", None).await;
        let id = add(&tree, OTHER_ID, "repo", Some("https://github.com/x")).await;

        assert!(!move_to_folder(&tree, &id, "Dev/Missing").await);
        assert!(move_to_folder(&tree, &id, "dev/github").await);
        assert_eq!(tree.get(&id).await.unwrap().parent_id, Some(github));
    }
}
