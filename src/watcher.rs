// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Tree change notifications feeding the auto-classifier

use tokio::sync::broadcast;
use tracing::warn;

use crate::tree::TreeNode;

/// Events published by a tree store
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// A new entry or folder was created
    Created { id: String, node: TreeNode },
    /// A node changed parent
    Moved {
        id: String,
        old_parent_id: Option<String>,
        parent_id: String,
    },
    /// A node (and its subtree) was removed
    Removed {
        id: String,
        parent_id: Option<String>,
    },
}

/// Receives tree events from a store subscription
pub struct TreeWatcher {
    event_rx: broadcast::Receiver<TreeEvent>,
}

impl TreeWatcher {
    pub fn new(event_rx: broadcast::Receiver<TreeEvent>) -> Self {
        Self { event_rx }
    }

    /// Wait for the next event; `None` once the store is gone
    pub async fn recv(&mut self) -> Option<TreeEvent> {
        loop {
            match self.event_rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Tree watcher lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Check if a created node should go through auto-classification
pub fn should_classify(node: &TreeNode) -> bool {
    match node.url.as_deref() {
        // Folders have no url
        None => false,
        Some(url) => !url.trim().is_empty(),
    }
}
