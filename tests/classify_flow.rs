// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

mod common;

use std::sync::Arc;
use tokio::sync::broadcast;

use common::{add_entry, add_folder, FixedOracle, SharedFactory};
use marksort::classify::{AutoClassifier, ClassifyEvent, ClassifySource, Reaction, CLASSIFY_FAILED};
use marksort::config::StaticConfig;
use marksort::rules::{MatchType, Rule};
use marksort::tree::{MemoryTree, TreeStore, OTHER_ID};
use marksort::watcher::{TreeEvent, TreeWatcher};
use marksort::AppConfig;

fn config(silent: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.auto_classify.silent_mode = silent;
    config.add_rule(Rule::new("GitHub", MatchType::Domain, "github.com", "Dev/GitHub"));
    config
}

fn classifier(tree: &MemoryTree, config: AppConfig, oracle: Arc<FixedOracle>) -> AutoClassifier {
    AutoClassifier::new(
        Arc::new(tree.clone()),
        Arc::new(StaticConfig::new(Some(config))),
        Arc::new(SharedFactory(oracle)),
    )
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<ClassifyEvent>) -> Vec<ClassifyEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn rule_match_is_suggested_without_the_oracle() {
    let tree = MemoryTree::new();
    let oracle = Arc::new(FixedOracle::new("Reading"));
    let classifier = classifier(&tree, config(false), oracle.clone());
    let mut rx = classifier.attach();

    let id = add_entry(&tree, OTHER_ID, "", "https://github.com/rust-lang/rust").await;
    let node = tree.get(&id).await.unwrap();
    assert_eq!(classifier.handle_created(&id, &node).await, Reaction::RuleSuggested);
    assert_eq!(oracle.call_count(), 0);

    assert_eq!(
        drain(&mut rx),
        vec![
            ClassifyEvent::Pending {
                entry_id: id.clone(),
                title: "https://github.com/rust-lang/rust".to_string(),
                url: "https://github.com/rust-lang/rust".to_string(),
            },
            ClassifyEvent::Result {
                entry_id: id.clone(),
                suggested_folder: "Dev/GitHub".to_string(),
                source: ClassifySource::Rule,
            },
        ]
    );
}

#[tokio::test]
async fn silent_rule_match_moves_into_existing_folder() {
    let tree = MemoryTree::new();
    let dev = add_folder(&tree, OTHER_ID, "Dev").await;
    let github = add_folder(&tree, &dev, "GitHub").await;
    let classifier = classifier(&tree, config(true), Arc::new(FixedOracle::new("Reading")));
    let mut rx = classifier.attach();

    let id = add_entry(&tree, OTHER_ID, "repo", "https://www.github.com/x").await;
    let node = tree.get(&id).await.unwrap();
    assert_eq!(
        classifier.handle_created(&id, &node).await,
        Reaction::RuleMoved { moved: true }
    );
    assert_eq!(tree.get(&id).await.unwrap().parent_id, Some(github));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn unmatched_entry_goes_to_the_oracle() {
    let tree = MemoryTree::new();
    let oracle = Arc::new(FixedOracle::new("Reading"));
    let classifier = classifier(&tree, config(false), oracle.clone());
    let mut rx = classifier.attach();

    let id = add_entry(&tree, OTHER_ID, "blog", "https://blog.example").await;
    let node = tree.get(&id).await.unwrap();
    assert_eq!(classifier.handle_created(&id, &node).await, Reaction::OracleSuggested);
    assert_eq!(oracle.call_count(), 1);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ClassifyEvent::Pending { .. }));
    assert_eq!(
        events[1],
        ClassifyEvent::Result {
            entry_id: id,
            suggested_folder: "Reading".to_string(),
            source: ClassifySource::Ai,
        }
    );
}

#[tokio::test]
async fn oracle_failure_dismisses_with_error() {
    let tree = MemoryTree::new();
    let classifier = classifier(&tree, config(false), Arc::new(FixedOracle::failing("HTTP 429")));
    let mut rx = classifier.attach();

    let id = add_entry(&tree, OTHER_ID, "blog", "https://blog.example").await;
    let node = tree.get(&id).await.unwrap();
    assert_eq!(
        classifier.handle_created(&id, &node).await,
        Reaction::Failed("HTTP 429".to_string())
    );
    let events = drain(&mut rx);
    assert_eq!(
        events.last(),
        Some(&ClassifyEvent::Dismiss {
            entry_id: id,
            error: Some("HTTP 429".to_string()),
        })
    );
}

#[tokio::test]
async fn folders_and_disabled_config_are_left_alone() {
    let tree = MemoryTree::new();
    let mut disabled = config(false);
    disabled.auto_classify.enabled = false;
    let oracle = Arc::new(FixedOracle::new("Reading"));
    let classifier = classifier(&tree, disabled, oracle.clone());

    let folder = add_folder(&tree, OTHER_ID, "Stuff").await;
    let folder_node = tree.get(&folder).await.unwrap();
    assert_eq!(classifier.handle_created(&folder, &folder_node).await, Reaction::Ignored);

    let id = add_entry(&tree, OTHER_ID, "blog", "https://blog.example").await;
    let node = tree.get(&id).await.unwrap();
    assert_eq!(classifier.handle_created(&id, &node).await, Reaction::Disabled);
    assert_eq!(oracle.call_count(), 0);
}

#[tokio::test]
async fn reactor_handles_events_until_the_channel_closes() {
    let tree = MemoryTree::new();
    let reading = add_folder(&tree, OTHER_ID, "Reading").await;
    let id = add_entry(&tree, OTHER_ID, "blog", "https://blog.example").await;
    let node = tree.get(&id).await.unwrap();

    let oracle = Arc::new(FixedOracle::new("Reading"));
    let classifier = Arc::new(classifier(&tree, config(true), oracle.clone()));

    let (tx, rx) = broadcast::channel(8);
    tx.send(TreeEvent::Created { id: id.clone(), node }).unwrap();
    tx.send(TreeEvent::Removed {
        id: "999".to_string(),
        parent_id: None,
    })
    .unwrap();
    drop(tx);

    classifier.run(TreeWatcher::new(rx)).await;
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(tree.get(&id).await.unwrap().parent_id, Some(reading));
}

#[tokio::test]
async fn accept_moves_into_named_folder() {
    let tree = MemoryTree::new();
    let target = add_folder(&tree, OTHER_ID, "Later").await;
    let classifier = classifier(&tree, config(false), Arc::new(FixedOracle::new("Reading")));
    let id = add_entry(&tree, OTHER_ID, "blog", "https://blog.example").await;

    assert!(!classifier.accept(&id, "Nowhere").await);
    assert!(classifier.accept(&id, "later").await);
    assert_eq!(tree.get(&id).await.unwrap().parent_id, Some(target));
}

#[tokio::test]
async fn empty_oracle_answer_dismisses_as_failed() {
    let tree = MemoryTree::new();
    let classifier = classifier(&tree, config(false), Arc::new(FixedOracle::silent()));
    let mut rx = classifier.attach();

    let id = add_entry(&tree, OTHER_ID, "blog", "https://blog.example").await;
    let node = tree.get(&id).await.unwrap();
    assert_eq!(classifier.handle_created(&id, &node).await, Reaction::Dismissed);

    let events = drain(&mut rx);
    assert!(matches!(events[0], ClassifyEvent::Pending { .. }));
    assert_eq!(
        events[1],
        ClassifyEvent::Dismiss {
            entry_id: id,
            error: Some(CLASSIFY_FAILED.to_string()),
        }
    );
}

#[tokio::test]
async fn vanished_entry_is_dismissed_quietly() {
    let tree = MemoryTree::new();
    let oracle = Arc::new(FixedOracle::new("Reading"));
    let classifier = classifier(&tree, config(false), oracle.clone());
    let mut rx = classifier.attach();

    let id = add_entry(&tree, OTHER_ID, "gone", "https://gone.example").await;
    let node = tree.get(&id).await.unwrap();
    tree.remove(&id).await.unwrap();

    assert_eq!(classifier.handle_created(&id, &node).await, Reaction::Dismissed);
    assert_eq!(oracle.call_count(), 0);
    assert_eq!(
        drain(&mut rx).last(),
        Some(&ClassifyEvent::Dismiss {
            entry_id: id,
            error: None,
        })
    );
}

#[tokio::test]
async fn silent_oracle_failure_leaves_entry_and_observer_alone() {
    let tree = MemoryTree::new();
    add_folder(&tree, OTHER_ID, "Reading").await;
    let classifier = classifier(&tree, config(true), Arc::new(FixedOracle::failing("HTTP 503")));
    let mut rx = classifier.attach();

    let id = add_entry(&tree, OTHER_ID, "blog", "https://blog.example").await;
    let node = tree.get(&id).await.unwrap();
    assert_eq!(
        classifier.handle_created(&id, &node).await,
        Reaction::Failed("HTTP 503".to_string())
    );
    assert!(drain(&mut rx).is_empty());
    assert_eq!(tree.get(&id).await.unwrap().parent_id.as_deref(), Some(OTHER_ID));
}
