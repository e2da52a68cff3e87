use git2::{ErrorCode, Oid, Repository, ResetType, Signature, Time};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use crate::config::Identity;
use crate::error::{Error, Result};
use crate::mapping;

/// A pending modification of the destination working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Write { path: String, content: Vec<u8> },
    Remove { path: String },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Change::Write { path, .. } | Change::Remove { path } => path,
        }
    }
}

/// The destination repository holding transformed history.
pub struct OutputRepository {
    pub repo: Mutex<Repository>,
    pub path: PathBuf,
}

impl OutputRepository {
    /// Opens an existing destination repository.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = Repository::open(&path)
            .map_err(|_| Error::RepoNotFound(path.display().to_string()))?;

        Ok(Self {
            repo: Mutex::new(repo),
            path,
        })
    }

    /// Opens the destination repository, creating it when `path` does not exist yet.
    pub fn open_or_init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::open(path);
        }

        fs::create_dir_all(path)?;
        let repo = Repository::init(path)?;
        tracing::info!("Initialized destination repository at {}", path.display());

        Ok(Self {
            repo: Mutex::new(repo),
            path: path.to_path_buf(),
        })
    }

    pub fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self
            .repo
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;
        f(&repo)
    }

    fn workdir(repo: &Repository) -> Result<PathBuf> {
        repo.workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::Internal("Destination repository is bare".to_string()))
    }

    /// Current HEAD commit, `None` while HEAD is unborn.
    pub fn head(&self) -> Result<Option<Oid>> {
        self.with_repo(|repo| head_oid(repo))
    }

    /// Original commit id recorded in the trailer of HEAD.
    pub fn head_original(&self) -> Result<Option<String>> {
        self.with_repo(|repo| {
            let Some(oid) = head_oid(repo)? else {
                return Ok(None);
            };
            let commit = repo.find_commit(oid)?;
            let original = mapping::original_id(commit.message().unwrap_or(""))
                .ok_or_else(|| Error::MissingTrailer(oid.to_string()))?;
            Ok(Some(original.to_string()))
        })
    }

    /// Resolves a revspec (`HEAD`, a branch or a commit id) to a commit.
    pub fn resolve(&self, rev: &str) -> Result<Oid> {
        self.with_repo(|repo| resolve_commit(repo, rev))
    }

    /// Applies `changes` to the working tree and the index.
    ///
    /// Removals go first, so a path can turn from a directory into a file
    /// (or back) within one commit.
    pub fn stage(&self, changes: &[Change]) -> Result<()> {
        let mut checked = changes
            .iter()
            .map(|change| Ok((checked_relative_path(change.path())?, change)))
            .collect::<Result<Vec<_>>>()?;
        checked.sort_by_key(|(_, change)| matches!(change, Change::Write { .. }));

        self.with_repo(|repo| {
            let workdir = Self::workdir(repo)?;
            let mut index = repo.index()?;

            for (relative, change) in checked {
                let full = workdir.join(&relative);
                match change {
                    Change::Write { content, .. } => {
                        if let Some(parent) = full.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        fs::write(&full, content)?;
                        index.add_path(&relative)?;
                    }
                    Change::Remove { path } => {
                        match fs::remove_file(&full) {
                            Ok(()) => prune_empty_dirs(&workdir, &full),
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                                tracing::warn!("Tried to remove file {}, but it didn't exist", path);
                            }
                            Err(e) => return Err(e.into()),
                        }

                        if index.get_path(&relative, 0).is_some() {
                            index.remove_path(&relative)?;
                        } else {
                            tracing::warn!(
                                "Tried to remove file {} from the index, but it didn't exist",
                                path
                            );
                        }
                    }
                }
            }

            index.write()?;
            Ok(())
        })
    }

    /// Writes the index to a tree and commits it on top of HEAD.
    ///
    /// The signature uses the synthetic `identity` with the given time so the
    /// resulting commit id depends only on the transformed content.
    pub fn seal(&self, message: &str, identity: &Identity, time: &Time) -> Result<Oid> {
        self.with_repo(|repo| {
            let mut index = repo.index()?;
            let tree_oid = index.write_tree()?;
            let tree = repo.find_tree(tree_oid)?;

            let signature = Signature::new(&identity.name, &identity.email, time)?;

            let parent = match head_oid(repo)? {
                Some(oid) => Some(repo.find_commit(oid)?),
                None => None,
            };
            let parents: Vec<&git2::Commit> = parent.iter().collect();

            let oid = repo.commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )?;
            Ok(oid)
        })
    }

    /// Drops anything staged since the last sealed commit.
    pub fn reset_to_head(&self) -> Result<()> {
        self.with_repo(|repo| {
            match head_oid(repo)? {
                Some(oid) => {
                    let object = repo.find_object(oid, None)?;
                    repo.reset(&object, ResetType::Hard, None)?;
                }
                None => {
                    let mut index = repo.index()?;
                    index.clear()?;
                    index.write()?;
                }
            }
            Ok(())
        })
    }

    /// Paths tracked by the tree of `rev`.
    pub fn tree_paths(&self, rev: &str) -> Result<Vec<String>> {
        self.with_repo(|repo| {
            let oid = resolve_commit(repo, rev)?;
            let tree = repo.find_commit(oid)?.tree()?;
            let mut paths = Vec::new();
            tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(git2::ObjectType::Blob) {
                    paths.push(format!("{}{}", root, entry.name().unwrap_or("")));
                }
                git2::TreeWalkResult::Ok
            })?;
            Ok(paths)
        })
    }
}

/// Removes the directories left empty above a removed file.
fn prune_empty_dirs(workdir: &Path, removed: &Path) {
    let mut dir = removed.parent();
    while let Some(current) = dir {
        if current == workdir || fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

pub fn head_oid(repo: &Repository) -> Result<Option<Oid>> {
    match repo.head() {
        Ok(head) => Ok(head.target()),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn resolve_commit(repo: &Repository, rev: &str) -> Result<Oid> {
    let object = repo
        .revparse_single(rev)
        .map_err(|_| Error::CommitNotFound(rev.to_string()))?;
    let commit = object
        .peel_to_commit()
        .map_err(|_| Error::CommitNotFound(rev.to_string()))?;
    Ok(commit.id())
}

/// Rejects paths that would escape the working tree.
pub fn checked_relative_path(path: &str) -> Result<PathBuf> {
    let relative = PathBuf::from(path);
    let safe = !path.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(relative)
}
