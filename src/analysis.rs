// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch analysis pipeline
//!
//! One pipeline owns the analysis state. A run walks the working set batch
//! by batch, asks the Oracle for each batch, lets user rules override the
//! answers, and pushes the whole state to the attached observer after every
//! step. Starting a run while another is active supersedes it: the old run
//! stops at its next batch boundary and can no longer touch the state.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::catalog::{chunk, Entry, Folder};
use crate::config::ConfigSource;
use crate::observer::{Delivery, ObserverSlot};
use crate::oracle::{CategoryPlanItem, OracleFactory, OracleSuggestion};
use crate::rules::apply_rules;
use crate::suggestion::{ChangeType, Suggestion, SuggestionStatus};
use crate::{MarksortError, Result};

/// Shown when no settings exist at all
pub const SETTINGS_MISSING: &str = "Settings not found. Please configure your AI provider first.";

/// How long a new run waits for the run it supersedes to notice the abort
const SETTLE_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Scanning,
    Analyzing,
    Done,
    Error,
}

impl Phase {
    pub fn is_running(self) -> bool {
        matches!(self, Phase::Scanning | Phase::Analyzing)
    }
}

/// Title and url of an entry in the batch being analyzed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPreview {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub phase: Phase,
    pub processed: usize,
    pub total: usize,
    pub current_batch: usize,
    pub total_batches: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub current_items: Vec<ItemPreview>,
}

/// Progress plus accumulated suggestions; what observers receive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    pub progress: AnalysisProgress,
    pub suggestions: Vec<Suggestion>,
}

/// Working set for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    /// Falls back to the configured batch size
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Restrict the Oracle to these folder paths
    #[serde(default)]
    pub confirmed_categories: Option<Vec<String>>,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Stopped by `stop()`; state settled to idle
    Aborted,
    /// A newer run or a reset took over; state left to the successor
    Superseded,
    Failed(String),
}

pub struct AnalysisPipeline {
    config: Arc<dyn ConfigSource>,
    oracles: Arc<dyn OracleFactory>,
    state: Mutex<AnalysisState>,
    abort: AtomicBool,
    generation: AtomicU64,
    observer: ObserverSlot<AnalysisState>,
}

impl AnalysisPipeline {
    pub fn new(config: Arc<dyn ConfigSource>, oracles: Arc<dyn OracleFactory>) -> Self {
        Self {
            config,
            oracles,
            state: Mutex::new(AnalysisState::default()),
            abort: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            observer: ObserverSlot::new(),
        }
    }

    /// Current progress and suggestions
    pub fn snapshot(&self) -> AnalysisState {
        self.lock().clone()
    }

    /// Attach an observer; it receives every state emitted from now on
    pub fn attach(&self) -> mpsc::Receiver<AnalysisState> {
        self.observer.attach()
    }

    pub fn detach(&self) {
        self.observer.detach();
    }

    pub fn is_running(&self) -> bool {
        self.lock().progress.phase.is_running()
    }

    /// Ask the active run to stop at its next batch boundary
    pub fn stop(&self) {
        info!("Stopping analysis");
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Abort any run and return to an empty idle state
    pub fn reset(&self) {
        self.abort.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        let state = {
            let mut state = self.lock();
            *state = AnalysisState::default();
            state.clone()
        };
        self.emit(state);
    }

    /// Accept, reject or modify one suggestion; false when it is not in the state
    pub fn set_status(&self, entry_id: &str, status: SuggestionStatus, folder_path: Option<&str>) -> bool {
        let state = {
            let mut state = self.lock();
            let Some(suggestion) = state.suggestions.iter_mut().find(|s| s.entry_id == entry_id) else {
                return false;
            };
            match (status, folder_path) {
                (SuggestionStatus::Modified, Some(path)) => suggestion.modify(path),
                _ => suggestion.status = status,
            }
            state.clone()
        };
        self.emit(state);
        true
    }

    /// Set every pending suggestion that would change something to `status`
    pub fn set_all_pending(&self, status: SuggestionStatus) -> usize {
        let (count, state) = {
            let mut state = self.lock();
            let mut count = 0;
            for s in state.suggestions.iter_mut() {
                if s.status == SuggestionStatus::Pending && s.change_type != ChangeType::NoChange {
                    s.status = status;
                    count += 1;
                }
            }
            (count, state.clone())
        };
        self.emit(state);
        count
    }

    /// Run an analysis to its end
    pub async fn start(&self, request: StartRequest) -> RunOutcome {
        if self.is_running() {
            info!("Superseding running analysis");
            self.abort.store(true, Ordering::SeqCst);
            tokio::time::sleep(SETTLE_INTERVAL).await;
        }

        let run = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort.store(false, Ordering::SeqCst);
        self.write(run, |state| *state = AnalysisState::default());

        let Some(config) = self.config.snapshot() else {
            warn!("Analysis started without settings");
            return self.fail(run, SETTINGS_MISSING.to_string());
        };
        let oracle = match self.oracles.build(&config) {
            Ok(oracle) => oracle,
            Err(e) => return self.fail(run, e.user_message()),
        };

        let batch_size = request
            .batch_size
            .filter(|n| *n > 0)
            .unwrap_or_else(|| config.batch_size());
        let batches = chunk(&request.entries, batch_size);
        let total = request.entries.len();
        info!("Analyzing {} entries in {} batches", total, batches.len());

        self.write(run, |state| {
            state.progress = AnalysisProgress {
                phase: Phase::Scanning,
                total,
                total_batches: batches.len(),
                ..AnalysisProgress::default()
            };
        });

        for (i, batch) in batches.iter().enumerate() {
            if self.superseded(run) {
                debug!("Run {} superseded before batch {}", run, i + 1);
                return RunOutcome::Superseded;
            }
            if self.abort.load(Ordering::SeqCst) {
                info!("Analysis aborted after {} of {} batches", i, batches.len());
                return self.abandon(run);
            }

            let live = self.write(run, |state| {
                state.progress.phase = Phase::Analyzing;
                state.progress.current_batch = i + 1;
                state.progress.current_items = batch
                    .iter()
                    .map(|e| ItemPreview {
                        title: e.title.clone(),
                        url: e.url.clone(),
                    })
                    .collect();
            });
            if !live {
                return RunOutcome::Superseded;
            }

            let reply = oracle
                .analyze_batch(batch, &request.folders, request.confirmed_categories.as_deref())
                .await;

            // A reply that arrives after stop or supersession is thrown away
            if self.superseded(run) {
                debug!("Run {} superseded during batch {}", run, i + 1);
                return RunOutcome::Superseded;
            }
            if self.abort.load(Ordering::SeqCst) {
                info!("Analysis aborted during batch {} of {}", i + 1, batches.len());
                return self.abandon(run);
            }

            let results = match reply {
                Ok(results) => results,
                Err(e) => {
                    warn!("Batch {} failed: {}", i + 1, e);
                    return self.fail(run, e.user_message());
                }
            };

            let suggestions = apply_rules(to_suggestions(results, batch), &config.rules);
            let live = self.write(run, |state| {
                state.suggestions.extend(suggestions);
                state.progress.processed = (state.progress.processed + batch.len()).min(total);
            });
            if !live {
                return RunOutcome::Superseded;
            }
        }

        let live = self.write(run, |state| {
            state.progress.phase = Phase::Done;
            state.progress.current_items.clear();
        });
        if live {
            info!("Analysis finished");
            RunOutcome::Completed
        } else {
            RunOutcome::Superseded
        }
    }

    /// One-shot category proposal; does not touch the analysis state
    pub async fn plan_categories(&self, entries: &[Entry], folders: &[Folder]) -> Result<Vec<CategoryPlanItem>> {
        let config = self
            .config
            .snapshot()
            .ok_or_else(|| MarksortError::ConfigMissing(SETTINGS_MISSING.to_string()))?;
        let oracle = self.oracles.build(&config)?;
        oracle.plan_categories(entries, folders).await
    }

    fn superseded(&self, run: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != run
    }

    /// Back to idle with nothing kept
    fn abandon(&self, run: u64) -> RunOutcome {
        let live = self.write(run, |state| {
            state.progress.phase = Phase::Idle;
            state.progress.current_items.clear();
            state.suggestions.clear();
        });
        if live {
            RunOutcome::Aborted
        } else {
            RunOutcome::Superseded
        }
    }

    fn fail(&self, run: u64, message: String) -> RunOutcome {
        let live = self.write(run, |state| {
            state.progress.phase = Phase::Error;
            state.progress.current_items.clear();
            state.progress.error = Some(message.clone());
        });
        if live {
            RunOutcome::Failed(message)
        } else {
            RunOutcome::Superseded
        }
    }

    /// Apply `update` and broadcast, unless `run` is no longer current
    fn write(&self, run: u64, update: impl FnOnce(&mut AnalysisState)) -> bool {
        let state = {
            let mut state = self.lock();
            if self.superseded(run) {
                return false;
            }
            update(&mut state);
            state.clone()
        };
        self.emit(state);
        true
    }

    fn emit(&self, state: AnalysisState) {
        if self.observer.emit(state) == Delivery::Dropped {
            debug!("No observer took the analysis state");
        }
    }

    fn lock(&self) -> MutexGuard<'_, AnalysisState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Map Oracle answers onto suggestions, filling details from the batch
fn to_suggestions(results: Vec<OracleSuggestion>, batch: &[Entry]) -> Vec<Suggestion> {
    results
        .into_iter()
        .map(|r| {
            let entry = batch.iter().find(|e| e.id == r.entry_id);
            let current = entry.map(|e| e.current_folder_path.clone()).unwrap_or_default();
            Suggestion {
                change_type: ChangeType::derive(&current, &r.suggested_folder, r.is_new_folder),
                entry_id: r.entry_id,
                title: entry.map(|e| e.title.clone()).unwrap_or_default(),
                url: entry.map(|e| e.url.clone()).unwrap_or_default(),
                current_folder_path: current,
                suggested_folder_path: r.suggested_folder,
                suggested_folder_id: None,
                is_new_folder: r.is_new_folder,
                reason: r.reason,
                status: SuggestionStatus::Pending,
            }
        })
        .collect()
}
