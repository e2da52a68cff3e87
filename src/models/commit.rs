use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A commit mined from the original repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCommit {
    /// Full commit identifier (40 hex characters for git)
    pub id: String,
    pub parents: Vec<String>,
    pub description: String,
    /// Committer timestamp in seconds since the epoch
    pub time: i64,
    /// Committer UTC offset in minutes
    pub offset_minutes: i32,
    /// Paths added, modified or removed by this commit
    pub touched: Vec<String>,
    /// New path → old path for copies and renames
    pub copies: BTreeMap<String, String>,
    /// Touched paths that are not valid UTF-8, lossily decoded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_utf8_paths: Vec<String>,
}

impl SourceCommit {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}
