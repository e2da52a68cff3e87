//! Error types shared by the generator, the viewer and the HTTP server.
//!
//! Defines the `Error` enum for all error conditions and implements Axum's
//! `IntoResponse` so the blame server can return JSON error bodies.
//!
//! Error mappings:
//! - `RepoNotFound`, `PathNotFound`, `CommitNotFound`, `MissingTrailer` → 404
//! - `InvalidPath` → 400
//! - everything else → 500

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Commit {0} has no original commit trailer")]
    MissingTrailer(String),

    #[error("Original commit {original} is mapped by both {first} and {second}")]
    DuplicateTrailer {
        original: String,
        first: String,
        second: String,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Merge commit {id} has {parents} parents, merges are not supported")]
    MergeUnsupported { id: String, parents: usize },

    #[error("Failed to seal destination commit for {original}: {source}")]
    Seal {
        original: String,
        #[source]
        source: git2::Error,
    },

    #[error("Comment service command not found: {0}")]
    CommentServiceMissing(String),

    #[error("Comment service did not become reachable: {0}")]
    CommentServiceUnavailable(String),

    #[error("Malformed blame output: {0}")]
    BlameParse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors that must abort a generate run instead of being logged
    /// against a single commit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Seal { .. }
                | Error::MergeUnsupported { .. }
                | Error::CommentServiceMissing(_)
                | Error::CommentServiceUnavailable(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::RepoNotFound(_)
            | Error::PathNotFound(_)
            | Error::CommitNotFound(_)
            | Error::MissingTrailer(_) => true,
            Error::Git(e) => e.code() == git2::ErrorCode::NotFound,
            _ => false,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else if matches!(self, Error::InvalidPath(_)) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
