// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Auto-classification of newly created entries
//!
//! Rules are tried first; only entries no rule claims go to the Oracle. In
//! silent mode the entry is moved straight away, otherwise the observer is
//! told about the suggestion and the user decides through [`AutoClassifier::accept`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::catalog::{extract_folders, flatten_entries};
use crate::config::{AppConfig, ConfigSource};
use crate::observer::{Delivery, ObserverSlot};
use crate::oracle::{OracleFactory, OracleSuggestion};
use crate::organize::move_to_folder;
use crate::rules::find_matching_rule;
use crate::tree::{TreeNode, TreeStore};
use crate::watcher::{should_classify, TreeEvent, TreeWatcher};
use crate::Result;

/// Shown when the Oracle answered without a suggestion
pub const CLASSIFY_FAILED: &str = "Classification failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifySource {
    Rule,
    Ai,
}

/// Notifications for the attached observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClassifyEvent {
    /// Classification of this entry has begun
    Pending {
        entry_id: String,
        title: String,
        url: String,
    },
    Result {
        entry_id: String,
        suggested_folder: String,
        source: ClassifySource,
    },
    /// Nothing to suggest; `error` is set when something went wrong
    Dismiss {
        entry_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// What the reactor did with one created node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Folder or url-less node
    Ignored,
    Disabled,
    RuleMoved { moved: bool },
    RuleSuggested,
    OracleMoved { moved: bool },
    OracleSuggested,
    /// Entry vanished or the Oracle had no answer
    Dismissed,
    Failed(String),
}

pub struct AutoClassifier {
    store: Arc<dyn TreeStore>,
    config: Arc<dyn ConfigSource>,
    oracles: Arc<dyn OracleFactory>,
    observer: ObserverSlot<ClassifyEvent>,
}

impl AutoClassifier {
    pub fn new(store: Arc<dyn TreeStore>, config: Arc<dyn ConfigSource>, oracles: Arc<dyn OracleFactory>) -> Self {
        Self {
            store,
            config,
            oracles,
            observer: ObserverSlot::new(),
        }
    }

    pub fn attach(&self) -> mpsc::Receiver<ClassifyEvent> {
        self.observer.attach()
    }

    pub fn detach(&self) {
        self.observer.detach();
    }

    /// React to one created node
    pub async fn handle_created(&self, id: &str, node: &TreeNode) -> Reaction {
        if !should_classify(node) {
            return Reaction::Ignored;
        }
        let config = self.config.snapshot().unwrap_or_default();
        if !config.auto_classify.enabled {
            return Reaction::Disabled;
        }

        let url = node.url.clone().unwrap_or_default();
        let title = if node.title.is_empty() {
            url.clone()
        } else {
            node.title.clone()
        };
        let silent = config.auto_classify.silent_mode;

        if let Some(rule) = find_matching_rule(&url, &config.rules) {
            debug!("Entry {} matched rule '{}'", id, rule.name);
            if silent {
                let moved = move_to_folder(self.store.as_ref(), id, &rule.target_folder_path).await;
                return Reaction::RuleMoved { moved };
            }
            self.emit(ClassifyEvent::Pending {
                entry_id: id.to_string(),
                title,
                url,
            });
            self.emit(ClassifyEvent::Result {
                entry_id: id.to_string(),
                suggested_folder: rule.target_folder_path.clone(),
                source: ClassifySource::Rule,
            });
            return Reaction::RuleSuggested;
        }

        if !silent {
            self.emit(ClassifyEvent::Pending {
                entry_id: id.to_string(),
                title,
                url,
            });
        }

        match self.ask_oracle(&config, id).await {
            Ok(None) => {
                debug!("Entry {} vanished before classification", id);
                if !silent {
                    self.dismiss(id, None);
                }
                Reaction::Dismissed
            }
            Ok(Some(results)) => match results.into_iter().next() {
                None => {
                    if !silent {
                        self.dismiss(id, Some(CLASSIFY_FAILED.to_string()));
                    }
                    Reaction::Dismissed
                }
                Some(suggestion) if silent => {
                    let moved = move_to_folder(self.store.as_ref(), id, &suggestion.suggested_folder).await;
                    Reaction::OracleMoved { moved }
                }
                Some(suggestion) => {
                    self.emit(ClassifyEvent::Result {
                        entry_id: id.to_string(),
                        suggested_folder: suggestion.suggested_folder,
                        source: ClassifySource::Ai,
                    });
                    Reaction::OracleSuggested
                }
            },
            Err(e) => {
                let message = e.user_message();
                warn!("Auto-classify of {} failed: {}", id, message);
                if !silent {
                    self.dismiss(id, Some(message.clone()));
                }
                Reaction::Failed(message)
            }
        }
    }

    /// Apply a suggestion the user accepted
    pub async fn accept(&self, entry_id: &str, folder_path: &str) -> bool {
        move_to_folder(self.store.as_ref(), entry_id, folder_path).await
    }

    /// Handle created entries until the watcher closes, one task per event
    pub async fn run(self: Arc<Self>, mut watcher: TreeWatcher) {
        info!("Auto-classifier listening for new entries");
        let mut tasks = JoinSet::new();
        while let Some(event) = watcher.recv().await {
            if let TreeEvent::Created { id, node } = event {
                let classifier = Arc::clone(&self);
                tasks.spawn(async move {
                    let reaction = classifier.handle_created(&id, &node).await;
                    debug!("Entry {}: {:?}", id, reaction);
                });
            }
            // Reap finished tasks without waiting
            while tasks.try_join_next().is_some() {}
        }
        while tasks.join_next().await.is_some() {}
        info!("Auto-classifier stopped");
    }

    /// `None` when the entry is no longer in the tree
    async fn ask_oracle(&self, config: &AppConfig, id: &str) -> Result<Option<Vec<OracleSuggestion>>> {
        let oracle = self.oracles.build(config)?;
        let tree = self.store.get_tree().await?;
        let Some(entry) = flatten_entries(&tree).into_iter().find(|e| e.id == id) else {
            return Ok(None);
        };
        let folders = extract_folders(&tree);
        oracle.analyze_batch(&[entry], &folders, None).await.map(Some)
    }

    fn dismiss(&self, id: &str, error: Option<String>) {
        self.emit(ClassifyEvent::Dismiss {
            entry_id: id.to_string(),
            error,
        });
    }

    fn emit(&self, event: ClassifyEvent) -> Delivery {
        let delivery = self.observer.emit(event);
        if delivery == Delivery::Dropped {
            debug!("Classify notification dropped");
        }
        delivery
    }
}
