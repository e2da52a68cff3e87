use git2::{Oid, Repository, Sort};

use crate::error::Result;
use crate::git::repository::head_oid;

/// A destination commit and its message.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub oid: Oid,
    pub message: String,
}

/// Walks the history reachable from HEAD, initial commit first.
pub fn walk_history(repo: &Repository) -> Result<Vec<HistoryEntry>> {
    let Some(head) = head_oid(repo)? else {
        return Ok(Vec::new());
    };

    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)?;
    revwalk.push(head)?;

    let mut entries = Vec::new();
    for oid in revwalk {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;
        entries.push(HistoryEntry {
            oid,
            message: commit.message().unwrap_or("").to_string(),
        });
    }

    Ok(entries)
}
