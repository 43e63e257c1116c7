// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Folder path normalization
//!
//! Paths are slash-separated folder titles relative to the organizable area.
//! Browsers label their root containers differently per locale, so a leading
//! root label is stripped before paths are compared or resolved.

/// Localized display names of the root containers, lowercase
pub const ROOT_CONTAINER_NAMES: [&str; 6] = [
    "bookmarks bar",
    "other bookmarks",
    "mobile bookmarks",
    "书签栏",
    "其他书签",
    "移动设备书签",
];

/// Canonical separator, trimmed segments, no empty segments
pub fn normalize_path(path: &str) -> String {
    segments(path).join("/")
}

/// Split a path into trimmed non-empty segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn is_root_container_name(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    ROOT_CONTAINER_NAMES.contains(&lower.as_str())
}

/// Normalize and drop a leading root container label
pub fn strip_root_prefix(path: &str) -> String {
    let parts = segments(path);
    match parts.first() {
        Some(first) if is_root_container_name(first) => parts[1..].join("/"),
        _ => parts.join("/"),
    }
}

/// Comparison key: root-stripped and lowercased
pub fn path_key(path: &str) -> String {
    strip_root_prefix(path).to_lowercase()
}

/// Two paths name the same folder location
pub fn same_location(a: &str, b: &str) -> bool {
    path_key(a) == path_key(b)
}
