//! UltraBlame: token-level blame for git repositories.
//!
//! The generator replays the history of an original repository into a
//! destination repository where every file is rewritten as one token per
//! line (optionally without comments). Blame of the destination is then
//! mapped back onto the original files by the viewer.

pub mod comments;
pub mod config;
pub mod error;
pub mod git;
pub mod mapping;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod source;
pub mod tokenize;
pub mod viewer;

pub use error::{Error, Result};
