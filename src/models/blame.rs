//! Blame data for a file of the destination repository.
//!
//! Each `BlameLine` covers exactly one line of the transformed file, which
//! is one token when the history was tokenized.

use std::collections::HashMap;

use serde::Serialize;

/// Blame of one file at one destination revision.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Blame {
    pub lines: Vec<BlameLine>,
    /// Commit details keyed by destination commit id
    pub commits: HashMap<String, BlameCommit>,
}

/// Attribution of a single line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlameLine {
    /// Destination commit that last changed this line
    pub commit: String,
    /// Content of the line
    pub context: String,
    /// Line number (1-indexed) in the commit that introduced it
    pub lineno_then: u32,
    /// Line number (1-indexed) in the blamed revision
    pub lineno_now: u32,
    pub modified: bool,
}

/// Commit metadata reported alongside blame lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlameCommit {
    pub id: String,
    pub author: Option<String>,
    pub author_mail: Option<String>,
    pub author_time: Option<i64>,
    pub author_tz: Option<String>,
    pub committer: Option<String>,
    pub committer_mail: Option<String>,
    pub committer_time: Option<i64>,
    pub committer_tz: Option<String>,
    pub summary: Option<String>,
    pub boundary: bool,
    /// Parent commit the line was followed into, if any
    pub previous: Option<String>,
    pub filename: Option<String>,
}

impl BlameCommit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}
