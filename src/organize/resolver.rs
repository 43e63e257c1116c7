// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Suggested path → folder id

use std::collections::HashMap;
use tracing::debug;

use crate::catalog::{extract_folders, Folder};
use crate::paths;
use crate::tree::{CreateDetails, TreeNode, TreeStore, OTHER_ID};
use crate::Result;

/// Known folder ids by root-stripped path, stored both as written and lowercased
#[derive(Debug, Clone, Default)]
pub struct FolderCache {
    ids: HashMap<String, String>,
}

impl FolderCache {
    pub fn from_folders(folders: &[Folder]) -> Self {
        let mut cache = Self::default();
        for folder in folders {
            let stripped = paths::strip_root_prefix(&folder.path);
            if !stripped.is_empty() {
                cache.insert(&stripped, &folder.id);
            }
        }
        cache
    }

    pub fn insert(&mut self, path: &str, id: &str) {
        self.ids.insert(path.to_string(), id.to_string());
        self.ids.insert(path.to_lowercase(), id.to_string());
    }

    /// Exact lookup first, then lowercased
    pub fn get(&self, path: &str) -> Option<&str> {
        self.ids
            .get(path)
            .or_else(|| self.ids.get(&path.to_lowercase()))
            .map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Cache seeded from every folder currently in the store
pub async fn build_folder_cache(store: &dyn TreeStore) -> Result<FolderCache> {
    let tree = store.get_tree().await?;
    Ok(FolderCache::from_folders(&extract_folders(&tree)))
}

/// Make sure every segment of `path` exists and return the leaf folder id.
///
/// New folders go under "Other bookmarks". Segments are reused from the
/// cache, then from a same-titled child folder, and created only when
/// neither exists.
pub async fn ensure_folder_path(store: &dyn TreeStore, path: &str, cache: &mut FolderCache) -> Result<String> {
    let mut parent_id = OTHER_ID.to_string();
    let mut current = String::new();

    for part in paths::segments(path) {
        if current.is_empty() {
            current = part.to_string();
        } else {
            current = format!("{}/{}", current, part);
        }

        if let Some(id) = cache.get(&current) {
            parent_id = id.to_string();
            continue;
        }

        let id = match find_child_folder(store, &parent_id, part).await? {
            Some(existing) => existing,
            None => {
                debug!("Creating folder '{}' under {}", part, parent_id);
                store
                    .create(CreateDetails {
                        parent_id: parent_id.clone(),
                        title: part.to_string(),
                        url: None,
                    })
                    .await?
                    .id
            }
        };
        cache.insert(&current, &id);
        parent_id = id;
    }

    Ok(parent_id)
}

async fn find_child_folder(store: &dyn TreeStore, parent_id: &str, title: &str) -> Result<Option<String>> {
    let wanted = title.to_lowercase();
    Ok(store
        .get_children(parent_id)
        .await?
        .into_iter()
        .find(|c| c.is_folder() && c.title.to_lowercase() == wanted)
        .map(|c| c.id))
}

/// Find an existing folder for `path` by walking titles, case-insensitively
pub async fn resolve_folder_path(store: &dyn TreeStore, path: &str) -> Result<Option<String>> {
    let stripped = paths::strip_root_prefix(path);
    let parts = paths::segments(&stripped);
    let Some(first) = parts.first() else {
        return Ok(None);
    };

    let tree = store.get_tree().await?;

    for root in &tree {
        for top in root.children.iter().flatten().filter(|n| n.is_folder()) {
            if top.title.to_lowercase() == first.to_lowercase() {
                if let Some(id) = resolve_from_node(top, &parts[1..]) {
                    return Ok(Some(id));
                }
            }
            if let Some(id) = resolve_from_node(top, &parts) {
                return Ok(Some(id));
            }
        }
    }

    Ok(tree.iter().find_map(|root| resolve_from_node(root, &parts)))
}

fn resolve_from_node(node: &TreeNode, parts: &[&str]) -> Option<String> {
    let Some((next, rest)) = parts.split_first() else {
        return Some(node.id.clone());
    };
    let wanted = next.to_lowercase();
    node.children
        .iter()
        .flatten()
        .find(|c| c.is_folder() && c.title.to_lowercase() == wanted)
        .and_then(|c| resolve_from_node(c, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{MemoryTree, BAR_ID};

    async fn folder(tree: &MemoryTree, parent: &str, title: &str) -> String {
        tree.create(CreateDetails {
            parent_id: parent.to_string(),
            title: title.to_string(),
            url: None,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn cache_keys_are_root_stripped() {
        let tree = MemoryTree::new();
        let dev = folder(&tree, BAR_ID, "Dev").await;
        let cache = build_folder_cache(&tree).await.unwrap();
        assert_eq!(cache.get("Dev"), Some(dev.as_str()));
        assert_eq!(cache.get("DEV"), Some(dev.as_str()));
        assert!(!cache.contains("Bookmarks bar"));
        // "Dev" as written plus its lowercased key; root containers add nothing
        assert_eq!(cache.len(), 2);
        assert!(FolderCache::default().is_empty());
    }

    #[tokio::test]
    async fn ensure_reuses_then_creates() {
        let tree = MemoryTree::new();
        let dev = folder(&tree, OTHER_ID, "dev").await;
        let mut cache = FolderCache::default();

        let leaf = ensure_folder_path(&tree, "Dev/Rust", &mut cache).await.unwrap();
        let node = tree.get(&leaf).await.unwrap();
        assert_eq!(node.title, "Rust");
        assert_eq!(node.parent_id.as_deref(), Some(dev.as_str()));
        assert_eq!(cache.get("dev/rust"), Some(leaf.as_str()));
    }

    #[tokio::test]
    async fn ensure_is_idempotent_with_populated_cache() {
        let tree = MemoryTree::new();
        let mut cache = build_folder_cache(&tree).await.unwrap();
        let first = ensure_folder_path(&tree, "Learning/Math", &mut cache).await.unwrap();
        let before = tree.get_tree().await.unwrap();

        let second = ensure_folder_path(&tree, "learning/math", &mut cache).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.get_tree().await.unwrap(), before);
    }

    #[tokio::test]
    async fn resolve_handles_root_titles_and_nesting() {
        let tree = MemoryTree::new();
        let dev = folder(&tree, BAR_ID, "Dev").await;
        let ai = folder(&tree, &dev, "AI").await;

        assert_eq!(resolve_folder_path(&tree, "Bookmarks bar/Dev/AI").await.unwrap(), Some(ai.clone()));
        assert_eq!(resolve_folder_path(&tree, "dev/ai").await.unwrap(), Some(ai));
        assert_eq!(resolve_folder_path(&tree, "Dev").await.unwrap(), Some(dev));
        assert_eq!(resolve_folder_path(&tree, "Nope").await.unwrap(), None);
        assert_eq!(resolve_folder_path(&tree, "/").await.unwrap(), None);
    }
}
