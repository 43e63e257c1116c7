// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Hierarchical bookmark store
//!
//! The core never owns the tree. Everything goes through [`TreeStore`], and
//! every call may fail or observe a tree that another actor changed a moment
//! ago. [`MemoryTree`] is the in-process implementation used by the CLI, the
//! server and the tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use crate::watcher::TreeEvent;
use crate::{MarksortError, Result};

/// Id of the invisible top-level container
pub const ROOT_ID: &str = "0";
/// Id of the primary visible root ("Bookmarks bar")
pub const BAR_ID: &str = "1";
/// Id of the generic unsorted root ("Other bookmarks")
pub const OTHER_ID: &str = "2";
/// Id of the mobile root
pub const MOBILE_ID: &str = "3";

/// Folders that are never deleted by cleanup
pub const SYSTEM_FOLDER_IDS: [&str; 3] = [ROOT_ID, BAR_ID, OTHER_ID];

/// A node as returned by the store; folders have no url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// Arguments for [`TreeStore::create`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDetails {
    pub parent_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Arguments for [`TreeStore::move_node`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveDestination {
    pub parent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl MoveDestination {
    pub fn into_folder(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            index: None,
        }
    }
}

/// Store operations consumed by the core
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Full tree, starting from the top-level container(s)
    async fn get_tree(&self) -> Result<Vec<TreeNode>>;

    /// A single node without its children
    async fn get(&self, id: &str) -> Result<TreeNode>;

    /// Direct children of a folder, without their own children
    async fn get_children(&self, id: &str) -> Result<Vec<TreeNode>>;

    /// A folder with its whole subtree
    async fn get_subtree(&self, id: &str) -> Result<TreeNode>;

    async fn create(&self, details: CreateDetails) -> Result<TreeNode>;

    async fn move_node(&self, id: &str, destination: MoveDestination) -> Result<TreeNode>;

    /// Remove an entry or an empty folder
    async fn remove(&self, id: &str) -> Result<()>;

    /// Remove a folder and everything below it
    async fn remove_tree(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredNode {
    id: String,
    parent_id: Option<String>,
    title: String,
    url: Option<String>,
    children: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<String, StoredNode>,
    next_id: u64,
}

impl Inner {
    fn node(&self, id: &str) -> Result<&StoredNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| MarksortError::Tree(format!("Can't find bookmark for id {}", id)))
    }

    fn allocate_id(&mut self) -> String {
        let id = self.next_id.to_string();
        self.next_id += 1;
        id
    }

    fn flat(&self, node: &StoredNode) -> TreeNode {
        let index = node
            .parent_id
            .as_ref()
            .and_then(|p| self.nodes.get(p))
            .and_then(|p| p.children.iter().position(|c| c == &node.id));
        TreeNode {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            title: node.title.clone(),
            url: node.url.clone(),
            index,
            children: None,
        }
    }

    fn build(&self, id: &str) -> Option<TreeNode> {
        let node = self.nodes.get(id)?;
        let mut out = self.flat(node);
        if node.url.is_none() {
            out.children = Some(node.children.iter().filter_map(|c| self.build(c)).collect());
        }
        Some(out)
    }

    fn insert(&mut self, node: TreeNode, parent_id: Option<String>) {
        let child_ids = node
            .children
            .as_ref()
            .map(|c| c.iter().map(|n| n.id.clone()).collect())
            .unwrap_or_default();
        if let Ok(n) = node.id.parse::<u64>() {
            self.next_id = self.next_id.max(n + 1);
        }
        self.nodes.insert(
            node.id.clone(),
            StoredNode {
                id: node.id.clone(),
                parent_id: parent_id.clone(),
                title: node.title,
                url: node.url,
                children: child_ids,
            },
        );
        for child in node.children.unwrap_or_default() {
            self.insert(child, Some(node.id.clone()));
        }
    }

    fn is_ancestor<'a>(&'a self, ancestor: &str, mut id: &'a str) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(id).and_then(|n| n.parent_id.as_deref()) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn drop_subtree(&mut self, id: &str) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children {
                self.drop_subtree(&child);
            }
        }
    }

    fn detach(&mut self, id: &str, parent_id: Option<&str>) {
        if let Some(parent) = parent_id.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| c != id);
        }
    }
}

/// In-process tree store with change notifications
#[derive(Clone)]
pub struct MemoryTree {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<TreeEvent>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Empty store with the standard root containers
    pub fn new() -> Self {
        Self::from_nodes(vec![standard_roots()])
    }

    /// Store seeded from a tree as returned by [`TreeStore::get_tree`]
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        let mut inner = Inner {
            nodes: HashMap::new(),
            next_id: 100,
        };
        for node in nodes {
            let parent = node.parent_id.clone();
            inner.insert(node, parent);
        }
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(inner)),
            events,
        }
    }

    /// Load a JSON snapshot; a missing file yields an empty store
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Tree file not found at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let nodes: Vec<TreeNode> = serde_json::from_str(&content)?;
        Ok(Self::from_nodes(nodes))
    }

    /// Write the current tree as a JSON snapshot
    pub fn save(&self, path: &Path) -> Result<()> {
        let tree = self.tree_now()?;
        std::fs::write(path, serde_json::to_string_pretty(&tree)?)?;
        Ok(())
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| MarksortError::Tree("Tree lock poisoned".to_string()))
    }

    fn tree_now(&self) -> Result<Vec<TreeNode>> {
        let inner = self.lock()?;
        let mut roots: Vec<&StoredNode> = inner
            .nodes
            .values()
            .filter(|n| n.parent_id.is_none())
            .collect();
        roots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(roots.iter().filter_map(|r| inner.build(&r.id)).collect())
    }

    fn publish(&self, event: TreeEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl TreeStore for MemoryTree {
    async fn get_tree(&self) -> Result<Vec<TreeNode>> {
        self.tree_now()
    }

    async fn get(&self, id: &str) -> Result<TreeNode> {
        let inner = self.lock()?;
        let node = inner.node(id)?;
        Ok(inner.flat(node))
    }

    async fn get_children(&self, id: &str) -> Result<Vec<TreeNode>> {
        let inner = self.lock()?;
        let node = inner.node(id)?;
        Ok(node
            .children
            .iter()
            .filter_map(|c| inner.nodes.get(c))
            .map(|c| inner.flat(c))
            .collect())
    }

    async fn get_subtree(&self, id: &str) -> Result<TreeNode> {
        let inner = self.lock()?;
        inner.node(id)?;
        inner
            .build(id)
            .ok_or_else(|| MarksortError::Tree(format!("Can't find bookmark for id {}", id)))
    }

    async fn create(&self, details: CreateDetails) -> Result<TreeNode> {
        let created = {
            let mut inner = self.lock()?;
            let parent = inner.node(&details.parent_id)?;
            if parent.url.is_some() {
                return Err(MarksortError::Tree(format!(
                    "Parent {} is not a folder",
                    details.parent_id
                )));
            }
            if details.parent_id == ROOT_ID {
                return Err(MarksortError::Tree("Can't modify the root bookmark folders".to_string()));
            }
            let id = inner.allocate_id();
            inner.nodes.insert(
                id.clone(),
                StoredNode {
                    id: id.clone(),
                    parent_id: Some(details.parent_id.clone()),
                    title: details.title,
                    url: details.url,
                    children: Vec::new(),
                },
            );
            if let Some(parent) = inner.nodes.get_mut(&details.parent_id) {
                parent.children.push(id.clone());
            }
            let node = inner.node(&id)?;
            inner.flat(node)
        };
        debug!("Created node {} under {:?}", created.id, created.parent_id);
        self.publish(TreeEvent::Created {
            id: created.id.clone(),
            node: created.clone(),
        });
        Ok(created)
    }

    async fn move_node(&self, id: &str, destination: MoveDestination) -> Result<TreeNode> {
        let (moved, old_parent) = {
            let mut inner = self.lock()?;
            let node = inner.node(id)?.clone();
            let target = inner.node(&destination.parent_id)?;
            if target.url.is_some() {
                return Err(MarksortError::Tree(format!(
                    "Target {} is not a folder",
                    destination.parent_id
                )));
            }
            if node.parent_id.is_none() || node.parent_id.as_deref() == Some(ROOT_ID) {
                return Err(MarksortError::Tree("Can't modify the root bookmark folders".to_string()));
            }
            if inner.is_ancestor(id, &destination.parent_id) {
                return Err(MarksortError::Tree("Can't move a folder into itself".to_string()));
            }
            inner.detach(id, node.parent_id.as_deref());
            if let Some(parent) = inner.nodes.get_mut(&destination.parent_id) {
                let at = destination
                    .index
                    .unwrap_or(parent.children.len())
                    .min(parent.children.len());
                parent.children.insert(at, id.to_string());
            }
            if let Some(stored) = inner.nodes.get_mut(id) {
                stored.parent_id = Some(destination.parent_id.clone());
            }
            let stored = inner.node(id)?;
            (inner.flat(stored), node.parent_id)
        };
        self.publish(TreeEvent::Moved {
            id: id.to_string(),
            old_parent_id: old_parent,
            parent_id: destination.parent_id,
        });
        Ok(moved)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let parent_id = {
            let mut inner = self.lock()?;
            let node = inner.node(id)?.clone();
            if SYSTEM_FOLDER_IDS.contains(&id) || id == MOBILE_ID {
                return Err(MarksortError::Tree("Can't modify the root bookmark folders".to_string()));
            }
            if !node.children.is_empty() {
                return Err(MarksortError::Tree("Can't remove non-empty folder".to_string()));
            }
            inner.detach(id, node.parent_id.as_deref());
            inner.nodes.remove(id);
            node.parent_id
        };
        self.publish(TreeEvent::Removed {
            id: id.to_string(),
            parent_id,
        });
        Ok(())
    }

    async fn remove_tree(&self, id: &str) -> Result<()> {
        let parent_id = {
            let mut inner = self.lock()?;
            let node = inner.node(id)?.clone();
            if SYSTEM_FOLDER_IDS.contains(&id) || id == MOBILE_ID {
                return Err(MarksortError::Tree("Can't modify the root bookmark folders".to_string()));
            }
            inner.detach(id, node.parent_id.as_deref());
            inner.drop_subtree(id);
            node.parent_id
        };
        self.publish(TreeEvent::Removed {
            id: id.to_string(),
            parent_id,
        });
        Ok(())
    }
}

fn standard_roots() -> TreeNode {
    let root_child = |id: &str, title: &str| TreeNode {
        id: id.to_string(),
        parent_id: Some(ROOT_ID.to_string()),
        title: title.to_string(),
        url: None,
        index: None,
        children: Some(Vec::new()),
    };
    TreeNode {
        id: ROOT_ID.to_string(),
        parent_id: None,
        title: String::new(),
        url: None,
        index: None,
        children: Some(vec![
            root_child(BAR_ID, "Bookmarks bar"),
            root_child(OTHER_ID, "Other bookmarks"),
            root_child(MOBILE_ID, "Mobile bookmarks"),
        ]),
    }
}
