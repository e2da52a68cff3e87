//! Original commit trailers and the destination ↔ original commit mapping.
//!
//! Every destination commit message ends with a paragraph of the form
//! `UltraBlame original commit: <40 hex id>`. The mapping is rebuilt by
//! walking destination history and reading that trailer back.

use std::collections::HashMap;
use std::sync::LazyLock;

use git2::Repository;
use regex::Regex;

use crate::error::{Error, Result};
use crate::git::history::walk_history;

pub const TRAILER_MARKER: &str = "UltraBlame original commit:";

static ORIGINAL_COMMIT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "{} ([0-9a-f]{{40}})",
        regex::escape(TRAILER_MARKER)
    ))
    .expect("trailer regex is valid")
});

/// Trailer line recording `original` in a destination commit message.
pub fn trailer(original: &str) -> String {
    format!("{} {}", TRAILER_MARKER, original)
}

/// Builds a destination commit message from an original description.
///
/// `@` is dropped so hosted mirrors do not notify mentioned users.
pub fn commit_message(description: &str, original: &str) -> String {
    format!("{}\n\n{}", description.replace('@', ""), trailer(original))
}

/// Extracts the original commit id from a destination commit message.
pub fn original_id(message: &str) -> Option<&str> {
    ORIGINAL_COMMIT_REGEX
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Two-way mapping between destination and original commit ids.
#[derive(Debug, Clone, Default)]
pub struct CommitMapping {
    to_original: HashMap<String, String>,
    to_destination: HashMap<String, String>,
}

impl CommitMapping {
    /// Walks the destination history and reads every trailer.
    ///
    /// A commit without a trailer, or two commits naming the same original,
    /// is an error.
    pub fn build(repo: &Repository) -> Result<Self> {
        let mut mapping = Self::default();

        for entry in walk_history(repo)? {
            let destination = entry.oid.to_string();
            let original = original_id(&entry.message)
                .ok_or_else(|| Error::MissingTrailer(destination.clone()))?;
            mapping.insert(destination, original.to_string())?;
        }

        tracing::debug!("Built commit mapping with {} entries", mapping.len());
        Ok(mapping)
    }

    fn insert(&mut self, destination: String, original: String) -> Result<()> {
        if let Some(first) = self.to_destination.get(&original) {
            return Err(Error::DuplicateTrailer {
                original,
                first: first.clone(),
                second: destination,
            });
        }
        self.to_destination
            .insert(original.clone(), destination.clone());
        self.to_original.insert(destination, original);
        Ok(())
    }

    pub fn original(&self, destination: &str) -> Result<&str> {
        self.to_original
            .get(destination)
            .map(String::as_str)
            .ok_or_else(|| Error::CommitNotFound(destination.to_string()))
    }

    pub fn destination(&self, original: &str) -> Result<&str> {
        self.to_destination
            .get(original)
            .map(String::as_str)
            .ok_or_else(|| Error::CommitNotFound(original.to_string()))
    }

    pub fn len(&self) -> usize {
        self.to_original.len()
    }
}
