// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Duplicate folder merging and empty folder removal

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tracing::{debug, info};

use super::{SagaStep, StepKind};
use crate::tree::{MoveDestination, TreeNode, TreeStore, MOBILE_ID, SYSTEM_FOLDER_IDS};
use crate::Result;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupeReport {
    pub merged: usize,
    pub errors: Vec<String>,
    pub steps: Vec<SagaStep>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub removed: usize,
    pub steps: Vec<SagaStep>,
}

/// Merge sibling folders whose titles match after trimming and lowercasing.
///
/// The first folder of each group keeps its place; the contents of the
/// others are moved into it before they are removed.
pub async fn deduplicate_folders(store: &dyn TreeStore) -> Result<DedupeReport> {
    let tree = store.get_tree().await?;
    let mut report = DedupeReport::default();
    for root in &tree {
        dedupe_children(store, root.clone(), &mut report).await;
    }
    if report.merged > 0 {
        info!("Merged {} duplicate folders", report.merged);
    }
    Ok(report)
}

fn dedupe_children<'a>(store: &'a dyn TreeStore, node: TreeNode, report: &'a mut DedupeReport) -> BoxFuture<'a, ()> {
    async move {
        let Some(children) = node.children.as_ref() else {
            return;
        };

        let mut groups: Vec<(String, Vec<&TreeNode>)> = Vec::new();
        for child in children.iter().filter(|c| c.is_folder()) {
            let key = child.title.trim().to_lowercase();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push(child),
                None => groups.push((key, vec![child])),
            }
        }

        for (_, group) in groups.iter().filter(|(_, g)| g.len() > 1) {
            let primary = group[0];
            for duplicate in &group[1..] {
                match merge_into(store, &duplicate.id, &primary.id).await {
                    Ok(()) => {
                        report.merged += 1;
                        report.steps.push(SagaStep::ok(StepKind::Dedupe, &duplicate.title));
                    }
                    Err(e) => {
                        let message = format!("Failed to merge folder \"{}\": {}", duplicate.title, e.user_message());
                        report.steps.push(SagaStep::failed(StepKind::Dedupe, &duplicate.title, &message));
                        report.errors.push(message);
                    }
                }
            }
        }

        // Contents moved around, read the children again before descending
        let refreshed = match store.get_children(&node.id).await {
            Ok(children) => children,
            Err(e) => {
                debug!("Folder {} went away during dedupe: {}", node.id, e);
                return;
            }
        };
        for child in refreshed.into_iter().filter(|c| c.is_folder()) {
            match store.get_subtree(&child.id).await {
                Ok(subtree) => dedupe_children(store, subtree, report).await,
                Err(e) => debug!("Skipping folder {}: {}", child.id, e),
            }
        }
    }
    .boxed()
}

async fn merge_into(store: &dyn TreeStore, duplicate_id: &str, primary_id: &str) -> Result<()> {
    for child in store.get_children(duplicate_id).await? {
        store
            .move_node(&child.id, MoveDestination::into_folder(primary_id))
            .await?;
    }
    store.remove(duplicate_id).await
}

/// Remove every folder that is empty once its own sub-folders were cleaned.
///
/// System folders are never removed but are still descended into. Errors
/// are logged and skipped.
pub async fn cleanup_empty_folders(store: &dyn TreeStore) -> Result<CleanupReport> {
    let tree = store.get_tree().await?;
    let mut report = CleanupReport::default();
    for root in &tree {
        for child in root.children.iter().flatten().filter(|c| c.is_folder()) {
            clean_node(store, child.id.clone(), &mut report).await;
        }
    }
    if report.removed > 0 {
        info!("Removed {} empty folders", report.removed);
    }
    Ok(report)
}

fn clean_node<'a>(store: &'a dyn TreeStore, id: String, report: &'a mut CleanupReport) -> BoxFuture<'a, bool> {
    async move {
        let children = match store.get_children(&id).await {
            Ok(children) => children,
            Err(e) => {
                debug!("Folder {} went away during cleanup: {}", id, e);
                return false;
            }
        };
        for child in children.into_iter().filter(|c| c.is_folder()) {
            clean_node(store, child.id, report).await;
        }

        if SYSTEM_FOLDER_IDS.contains(&id.as_str()) || id == MOBILE_ID {
            return false;
        }

        match store.get_children(&id).await {
            Ok(remaining) if remaining.is_empty() => {
                let title = store.get(&id).await.map(|n| n.title).unwrap_or_default();
                match store.remove(&id).await {
                    Ok(()) => {
                        report.removed += 1;
                        report.steps.push(SagaStep::ok(StepKind::Cleanup, &title));
                        true
                    }
                    Err(e) => {
                        debug!("Could not remove empty folder {}: {}", id, e);
                        let message = format!("Failed to remove empty folder \"{}\": {}", title, e.user_message());
                        report.steps.push(SagaStep::failed(StepKind::Cleanup, &title, &message));
                        false
                    }
                }
            }
            Ok(_) => false,
            Err(e) => {
                debug!("Folder {} went away during cleanup: {}", id, e);
                false
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::count_tree;
    use crate::organize::StepOutcome;
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

    #[tokio::test]
    async fn duplicates_merge_into_first_seen() {
        let tree = MemoryTree::new();
        let first = add(&tree, BAR_ID, "Dev", None).await;
        let second = add(&tree, BAR_ID, " dev ", None).await;
        add(&tree, &first, "a", Some("https://a.io")).await;
        add(&tree, &second, "b", Some("https://b.io")).await;
        let entries_before = count_tree(&tree.get_tree().await.unwrap()).entries;

        let report = deduplicate_folders(&tree).await.unwrap();
        assert_eq!(report.merged, 1);
        assert!(report.errors.is_empty());
        assert_eq!(tree.get_children(&first).await.unwrap().len(), 2);
        assert!(tree.get(&second).await.is_err());
        assert_eq!(count_tree(&tree.get_tree().await.unwrap()).entries, entries_before);
    }

    #[tokio::test]
    async fn nested_duplicates_surfaced_by_a_merge_are_merged_too() {
        let tree = MemoryTree::new();
        let a = add(&tree, OTHER_ID, "Dev", None).await;
        let b = add(&tree, OTHER_ID, "Dev", None).await;
        let rust_a = add(&tree, &a, "Rust", None).await;
        let rust_b = add(&tree, &b, "rust", None).await;
        add(&tree, &rust_a, "book", Some("https://doc.rust-lang.org/book")).await;
        add(&tree, &rust_b, "std", Some("https://doc.rust-lang.org/std")).await;

        let report = deduplicate_folders(&tree).await.unwrap();
        assert_eq!(report.merged, 2);
        let children = tree.get_children(&a).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(tree.get_children(&rust_a).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_folders_are_removed_bottom_up() {
        let tree = MemoryTree::new();
        let outer = add(&tree, BAR_ID, "Outer", None).await;
        add(&tree, &outer, "Inner", None).await;
        let kept = add(&tree, OTHER_ID, "Kept", None).await;
        add(&tree, &kept, "x", Some("https://x.io")).await;

        let report = cleanup_empty_folders(&tree).await.unwrap();
        assert_eq!(report.removed, 2);
        assert!(tree.get(&outer).await.is_err());
        assert!(tree.get(&kept).await.is_ok());
        for id in SYSTEM_FOLDER_IDS {
            assert!(tree.get(id).await.is_ok());
        }
        // The mobile root is skipped, not reported as a failed removal
        assert!(tree.get(MOBILE_ID).await.is_ok());
        assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Ok));
    }
}
