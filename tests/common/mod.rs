// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Shared fakes for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use marksort::catalog::{Entry, Folder};
use marksort::oracle::{CategoryPlanItem, ConnectionStatus, Oracle, OracleFactory, OracleSuggestion};
use marksort::tree::{CreateDetails, MemoryTree, MoveDestination, TreeNode, TreeStore};
use marksort::{AppConfig, MarksortError, Result};

/// Sends every entry to one folder, optionally after a delay, and counts calls
pub struct FixedOracle {
    pub folder: String,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub fail_with: Option<String>,
    /// Answer with an empty list
    pub no_answer: bool,
}

impl FixedOracle {
    pub fn new(folder: &str) -> Self {
        Self {
            folder: folder.to_string(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            fail_with: None,
            no_answer: false,
        }
    }

    pub fn slow(folder: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(folder)
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new("")
        }
    }

    pub fn slow_failing(message: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::failing(message)
        }
    }

    pub fn silent() -> Self {
        Self {
            no_answer: true,
            ..Self::new("")
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for FixedOracle {
    async fn analyze_batch(
        &self,
        entries: &[Entry],
        _known_folders: &[Folder],
        _confirmed_categories: Option<&[String]>,
    ) -> Result<Vec<OracleSuggestion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(MarksortError::Oracle(message.clone()));
        }
        if self.no_answer {
            return Ok(Vec::new());
        }
        Ok(entries
            .iter()
            .map(|e| OracleSuggestion {
                entry_id: e.id.clone(),
                suggested_folder: self.folder.clone(),
                is_new_folder: true,
                reason: Some("fixed".to_string()),
                confidence: None,
            })
            .collect())
    }

    async fn plan_categories(&self, _entries: &[Entry], _known_folders: &[Folder]) -> Result<Vec<CategoryPlanItem>> {
        Ok(vec![CategoryPlanItem {
            path: self.folder.clone(),
            description: "everything".to_string(),
            estimated_count: None,
        }])
    }

    async fn test_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            ok: true,
            message: "Connected".to_string(),
        }
    }
}

/// Hands out the same oracle for every config
pub struct SharedFactory(pub Arc<FixedOracle>);

impl OracleFactory for SharedFactory {
    fn build(&self, _config: &AppConfig) -> Result<Arc<dyn Oracle>> {
        Ok(self.0.clone())
    }
}

pub fn entries(count: usize) -> Vec<Entry> {
    (0..count)
        .map(|i| Entry {
            id: format!("{}", 100 + i),
            parent_id: Some("1".to_string()),
            title: format!("Entry {}", i),
            url: format!("https://site{}.example/", i),
            current_folder_path: "Bookmarks bar".to_string(),
            current_folder_id: Some("1".to_string()),
        })
        .collect()
}

pub async fn add_folder(tree: &MemoryTree, parent: &str, title: &str) -> String {
    tree.create(CreateDetails {
        parent_id: parent.to_string(),
        title: title.to_string(),
        url: None,
    })
    .await
    .unwrap()
    .id
}

pub async fn add_entry(tree: &MemoryTree, parent: &str, title: &str, url: &str) -> String {
    tree.create(CreateDetails {
        parent_id: parent.to_string(),
        title: title.to_string(),
        url: Some(url.to_string()),
    })
    .await
    .unwrap()
    .id
}

/// Tree that refuses to create folders with given titles or remove given ids
pub struct FlakyTree {
    pub inner: MemoryTree,
    refuse_titles: HashSet<String>,
    refuse_removal: Mutex<HashSet<String>>,
}

impl FlakyTree {
    pub fn new(inner: MemoryTree) -> Self {
        Self {
            inner,
            refuse_titles: HashSet::new(),
            refuse_removal: Mutex::new(HashSet::new()),
        }
    }

    pub fn refuse_folder(mut self, title: &str) -> Self {
        self.refuse_titles.insert(title.to_string());
        self
    }

    pub fn refuse_removal(&self, id: &str) {
        self.refuse_removal.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl TreeStore for FlakyTree {
    async fn get_tree(&self) -> Result<Vec<TreeNode>> {
        self.inner.get_tree().await
    }

    async fn get(&self, id: &str) -> Result<TreeNode> {
        self.inner.get(id).await
    }

    async fn get_children(&self, id: &str) -> Result<Vec<TreeNode>> {
        self.inner.get_children(id).await
    }

    async fn get_subtree(&self, id: &str) -> Result<TreeNode> {
        self.inner.get_subtree(id).await
    }

    async fn create(&self, details: CreateDetails) -> Result<TreeNode> {
        if details.url.is_none() && self.refuse_titles.contains(&details.title) {
            return Err(MarksortError::Tree("quota exceeded".to_string()));
        }
        self.inner.create(details).await
    }

    async fn move_node(&self, id: &str, destination: MoveDestination) -> Result<TreeNode> {
        self.inner.move_node(id, destination).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        if self.refuse_removal.lock().unwrap().contains(id) {
            return Err(MarksortError::Tree("folder is locked".to_string()));
        }
        self.inner.remove(id).await
    }

    async fn remove_tree(&self, id: &str) -> Result<()> {
        self.inner.remove_tree(id).await
    }
}
