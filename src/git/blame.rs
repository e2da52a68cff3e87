//! Destination blame.
//!
//! Blame is computed either in-process with libgit2 or by running
//! `git blame --porcelain` and parsing its output. Both produce a [`Blame`]
//! with one [`BlameLine`] per line of the blamed file.

use std::path::Path;
use std::process::Command;

use git2::{BlameHunk, BlameOptions, Oid, Repository};

use crate::error::{Error, Result};
use crate::models::{Blame, BlameCommit, BlameLine};

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlameEngine {
    /// Compute blame in-process with libgit2
    #[default]
    Libgit2,
    /// Run `git blame --porcelain` in the destination repository
    Git,
}

/// Blames `path` as of destination commit `rev`.
pub fn blame(repo: &Repository, rev: Oid, path: &str, engine: BlameEngine) -> Result<Blame> {
    match engine {
        BlameEngine::Libgit2 => blame_libgit2(repo, rev, path),
        BlameEngine::Git => blame_git_cli(repo, rev, path),
    }
}

fn blame_libgit2(repo: &Repository, rev: Oid, path: &str) -> Result<Blame> {
    let commit = repo
        .find_commit(rev)
        .map_err(|_| Error::CommitNotFound(rev.to_string()))?;
    let entry = commit
        .tree()?
        .get_path(Path::new(path))
        .map_err(|_| Error::PathNotFound(path.to_string()))?;
    let blob = entry
        .to_object(repo)?
        .peel_to_blob()
        .map_err(|_| Error::InvalidPath(format!("{} is not a file", path)))?;

    let content = String::from_utf8_lossy(blob.content()).to_string();
    let mut lines: Vec<&str> = content.split('\n').collect();
    if content.ends_with('\n') {
        lines.pop();
    }

    let mut opts = BlameOptions::new();
    opts.newest_commit(rev);
    let file_blame = repo.blame_file(Path::new(path), Some(&mut opts))?;

    let mut result = Blame::default();
    for hunk in file_blame.iter() {
        let id = hunk.final_commit_id();
        let key = id.to_string();

        if !result.commits.contains_key(&key) {
            let blamed = repo.find_commit(id)?;
            result
                .commits
                .insert(key.clone(), commit_from_hunk(&blamed, &hunk));
        }

        for i in 0..hunk.lines_in_hunk() {
            let lineno_now = hunk.final_start_line() + i;
            let lineno_then = hunk.orig_start_line() + i;
            let context = lines
                .get(lineno_now.saturating_sub(1))
                .copied()
                .unwrap_or_default();

            result.lines.push(BlameLine {
                commit: key.clone(),
                context: context.to_string(),
                lineno_then: lineno_then as u32,
                lineno_now: lineno_now as u32,
                modified: false,
            });
        }
    }

    result.lines.sort_by_key(|line| line.lineno_now);
    Ok(result)
}

fn commit_from_hunk(commit: &git2::Commit, hunk: &BlameHunk) -> BlameCommit {
    let author = commit.author();
    let committer = commit.committer();

    let previous = if hunk.is_boundary() {
        None
    } else {
        commit.parent_id(0).ok().map(|p| p.to_string())
    };

    BlameCommit {
        id: commit.id().to_string(),
        author: author.name().map(String::from),
        author_mail: author.email().map(|e| format!("<{}>", e)),
        author_time: Some(author.when().seconds()),
        author_tz: Some(format_tz(author.when().offset_minutes())),
        committer: committer.name().map(String::from),
        committer_mail: committer.email().map(|e| format!("<{}>", e)),
        committer_time: Some(committer.when().seconds()),
        committer_tz: Some(format_tz(committer.when().offset_minutes())),
        summary: commit.summary().map(String::from),
        boundary: hunk.is_boundary(),
        previous,
        filename: hunk.path().map(|p| p.to_string_lossy().to_string()),
    }
}

/// Formats a UTC offset the way git prints it, e.g. `+0130`.
fn format_tz(offset_minutes: i32) -> String {
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let minutes = offset_minutes.abs();
    format!("{}{:02}{:02}", sign, minutes / 60, minutes % 60)
}

fn blame_git_cli(repo: &Repository, rev: Oid, path: &str) -> Result<Blame> {
    let dir = repo.workdir().unwrap_or_else(|| repo.path());
    let output = Command::new("git")
        .arg("blame")
        .arg("--porcelain")
        .arg(rev.to_string())
        .arg("--")
        .arg(path)
        .current_dir(dir)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no such path") {
            return Err(Error::PathNotFound(path.to_string()));
        }
        return Err(Error::Internal(format!(
            "git blame failed for {}: {}",
            path,
            stderr.trim()
        )));
    }

    parse_porcelain(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the output of `git blame --porcelain`.
pub fn parse_porcelain(output: &str) -> Result<Blame> {
    let mut blame = Blame::default();
    let mut lines = output.split('\n');

    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let id = fields
            .next()
            .filter(|id| id.len() >= 40 && id.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| Error::BlameParse(format!("bad header line: {:?}", line)))?
            .to_string();
        let lineno_then = parse_lineno(fields.next(), line)?;
        let lineno_now = parse_lineno(fields.next(), line)?;

        let commit = blame
            .commits
            .entry(id.clone())
            .or_insert_with(|| BlameCommit::new(id.clone()));

        let mut context = None;
        for detail in lines.by_ref() {
            if let Some(content) = detail.strip_prefix('\t') {
                context = Some(content);
                break;
            }
            match detail.split_once(' ') {
                Some((key, value)) => apply_key(commit, key, Some(value)),
                None => apply_key(commit, detail, None),
            }
        }

        let context = context.ok_or_else(|| {
            Error::BlameParse(format!("missing content line for commit {}", id))
        })?;

        blame.lines.push(BlameLine {
            commit: id,
            context: context.to_string(),
            lineno_then,
            lineno_now,
            modified: false,
        });
    }

    Ok(blame)
}

fn parse_lineno(field: Option<&str>, line: &str) -> Result<u32> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| Error::BlameParse(format!("bad line numbers: {:?}", line)))
}

fn apply_key(commit: &mut BlameCommit, key: &str, value: Option<&str>) {
    let text = || value.map(String::from);
    match key {
        "author" => commit.author = text(),
        "author-mail" => commit.author_mail = text(),
        "author-time" => commit.author_time = value.and_then(|v| v.parse().ok()),
        "author-tz" => commit.author_tz = text(),
        "committer" => commit.committer = text(),
        "committer-mail" => commit.committer_mail = text(),
        "committer-time" => commit.committer_time = value.and_then(|v| v.parse().ok()),
        "committer-tz" => commit.committer_tz = text(),
        "summary" => commit.summary = text(),
        "boundary" => commit.boundary = true,
        "previous" => {
            commit.previous = value
                .and_then(|v| v.split_whitespace().next())
                .map(String::from)
        }
        "filename" => commit.filename = text(),
        other => tracing::debug!("Ignoring unknown blame key {:?}", other),
    }
}
