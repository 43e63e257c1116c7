// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Flat views over the bookmark tree

use serde::{Deserialize, Serialize};

use crate::tree::{TreeNode, BAR_ID, OTHER_ID, ROOT_ID};

/// A single link record with its current location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub title: String,
    pub url: String,
    /// Slash-joined folder titles, `/` when the entry has no folder ancestor
    pub current_folder_path: String,
    #[serde(default)]
    pub current_folder_id: Option<String>,
}

/// A folder with its full path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub title: String,
    pub path: String,
    #[serde(default)]
    pub children: Vec<Folder>,
}

/// Collect every entry (node with a url) in depth-first order
pub fn flatten_entries(nodes: &[TreeNode]) -> Vec<Entry> {
    let mut out = Vec::new();
    collect_entries(nodes, "", None, &mut out);
    out
}

fn collect_entries(nodes: &[TreeNode], folder_path: &str, folder_id: Option<&str>, out: &mut Vec<Entry>) {
    for node in nodes {
        if let Some(url) = &node.url {
            out.push(Entry {
                id: node.id.clone(),
                parent_id: node.parent_id.clone(),
                title: node.title.clone(),
                url: url.clone(),
                current_folder_path: if folder_path.is_empty() {
                    "/".to_string()
                } else {
                    folder_path.to_string()
                },
                current_folder_id: folder_id.map(String::from),
            });
        } else if let Some(children) = &node.children {
            let path = join(folder_path, &node.title);
            collect_entries(children, &path, Some(&node.id), out);
        }
    }
}

/// Collect every folder as a flat list, parents before descendants
pub fn extract_folders(nodes: &[TreeNode]) -> Vec<Folder> {
    let mut out = Vec::new();
    collect_folders(nodes, "", &mut out);
    out
}

fn collect_folders(nodes: &[TreeNode], parent_path: &str, out: &mut Vec<Folder>) -> Vec<Folder> {
    let mut direct = Vec::new();
    for node in nodes.iter().filter(|n| n.is_folder()) {
        let path = join(parent_path, &node.title);
        let slot = out.len();
        out.push(Folder {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            title: node.title.clone(),
            path: path.clone(),
            children: Vec::new(),
        });
        if let Some(children) = &node.children {
            let nested = collect_folders(children, &path, out);
            out[slot].children = nested;
        }
        direct.push(out[slot].clone());
    }
    direct
}

fn join(parent: &str, title: &str) -> String {
    if parent.is_empty() {
        title.to_string()
    } else {
        format!("{}/{}", parent, title)
    }
}

/// Entry and folder totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeCounts {
    pub entries: usize,
    pub folders: usize,
}

pub fn count_tree(nodes: &[TreeNode]) -> TreeCounts {
    let mut counts = TreeCounts::default();
    for node in nodes {
        if node.url.is_some() {
            counts.entries += 1;
        } else {
            counts.folders += 1;
            if let Some(children) = &node.children {
                let nested = count_tree(children);
                counts.entries += nested.entries;
                counts.folders += nested.folders;
            }
        }
    }
    counts
}

/// Entry sits directly under one of the system root folders
pub fn is_unclassified(entry: &Entry) -> bool {
    matches!(entry.parent_id.as_deref(), Some(ROOT_ID | BAR_ID | OTHER_ID))
}

/// Split into consecutive batches of at most `size` items
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}
