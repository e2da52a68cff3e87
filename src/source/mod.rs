//! The original repository, seen as a read-only revision source.
//!
//! `RevisionSource` is the seam between the transcoding pipeline and the
//! upstream version-control backend. Handles are not assumed to be safe for
//! concurrent use, so parallel callers take them from a [`SourcePool`].

pub mod git;
pub mod pool;

use std::path::Path;

use crate::error::Result;
use crate::models::SourceCommit;

pub use git::GitSource;
pub use pool::{PooledSource, SourcePool};

/// Where a revision listing starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeStart {
    /// From the first commit of the history
    Root,
    /// From the given revision, inclusive
    From(String),
    /// From the children of the given revision
    After(String),
}

/// Revisions to mine, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRange {
    pub start: RangeStart,
    pub end: String,
}

impl RevisionRange {
    pub fn new(start: RangeStart, end: impl Into<String>) -> Self {
        Self {
            start,
            end: end.into(),
        }
    }
}

/// Content of a path at a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRead {
    Present(Vec<u8>),
    /// The path does not exist as a file at that revision
    Absent,
}

pub trait RevisionSource: Send + Sized {
    /// Opens a new handle on the repository at `path`.
    fn open(path: &Path) -> Result<Self>;

    /// Lists non-merge commit identifiers of `range`, oldest first.
    fn list_revisions(&self, range: &RevisionRange) -> Result<Vec<String>>;

    fn commit_metadata(&self, id: &str) -> Result<SourceCommit>;

    fn read(&self, path: &str, id: &str) -> Result<FileRead>;
}
