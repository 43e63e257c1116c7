// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! marksort: rule-first, AI-assisted bookmark organizer
//!
//! User rules decide first; an external classification service (the Oracle)
//! proposes folders for whatever the rules leave open. Accepted suggestions
//! are applied to the tree in passes that tolerate per-item failures, and
//! duplicate or empty folders are reconciled afterwards.

pub mod analysis;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod observer;
pub mod oracle;
pub mod organize;
pub mod paths;
pub mod rules;
pub mod suggestion;
pub mod tree;
pub mod watcher;
pub mod web;

pub use config::AppConfig;
pub use error::{MarksortError, Result};
