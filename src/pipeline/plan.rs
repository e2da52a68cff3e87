//! Per-commit file actions.

use std::collections::HashSet;
use std::path::Path;

use crate::models::SourceCommit;

/// Extensions of files that are never transformed nor staged.
pub const BINARY_EXTENSIONS: [&str; 42] = [
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "icns", "psd", "tiff", "ttf", "bcmap", "webp",
    "zip", "gz", "bz2", "tar", "xpi", "jar", "mp4", "webm", "ogv", "avi", "mov", "m4s", "mgif",
    "mp3", "ogg", "wav", "flac", "opus", "exe", "dll", "so", "class", "binjs", "pdf", "doc",
    "otf", "sqlite", "woff", "woff2", "crt",
];

pub fn is_binary(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

/// Write `path` with its content at the commit, or remove it if it is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAction {
    pub path: String,
    /// Source of a copy or rename producing `path`
    pub copied_from: Option<String>,
}

/// Lists the file actions needed to replay `commit`, in touched order.
///
/// Binary paths are skipped. Copy sources get no action of their own
/// unless the commit touched them too.
pub fn plan(commit: &SourceCommit) -> Vec<FileAction> {
    let mut seen = HashSet::new();
    let mut actions = Vec::new();

    for path in &commit.touched {
        if path.is_empty() || is_binary(path) || !seen.insert(path.as_str()) {
            continue;
        }
        actions.push(FileAction {
            path: path.clone(),
            copied_from: commit.copies.get(path).cloned(),
        });
    }

    actions
}
