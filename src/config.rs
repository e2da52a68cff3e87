//! Run configuration for the generator.
//!
//! The CLI fills these in from arguments and `ULTRABLAME_*` environment
//! variables; library callers construct them with [`GenerateOptions::new`].

use std::path::PathBuf;

use git2::Time;

use crate::models::SourceCommit;
use crate::source::RangeStart;

pub const DEFAULT_COMMENT_SERVICE_COMMAND: &str = "rust-code-analysis-web";
pub const DEFAULT_ERROR_LOG: &str = "errors.txt";

/// Author and committer identity of every destination commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "UltraBlame".to_string(),
            email: "ultrablame@localhost".to_string(),
        }
    }
}

impl Identity {
    /// Signature time for the destination commit of `commit`.
    pub fn time_of(commit: &SourceCommit) -> Time {
        Time::new(commit.time, commit.offset_minutes)
    }
}

/// How to reach the comment-stripping service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentService {
    /// Spawn this command with `--port <port>` for the duration of the run
    Spawn(String),
    /// Use an already running service at this base URL
    Endpoint(String),
}

impl Default for CommentService {
    fn default() -> Self {
        CommentService::Spawn(DEFAULT_COMMENT_SERVICE_COMMAND.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub rev_start: RangeStart,
    pub rev_end: String,
    /// Maximum number of commits to transcode in this run
    pub limit: Option<usize>,
    pub tokenize: bool,
    pub remove_comments: bool,
    pub comment_service: CommentService,
    pub workers: usize,
    pub error_log: PathBuf,
    pub identity: Identity,
}

impl GenerateOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            rev_start: RangeStart::Root,
            rev_end: "HEAD".to_string(),
            limit: None,
            tokenize: true,
            remove_comments: false,
            comment_service: CommentService::default(),
            workers: default_workers(),
            error_log: PathBuf::from(DEFAULT_ERROR_LOG),
            identity: Identity::default(),
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
