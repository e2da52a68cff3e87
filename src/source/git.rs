use std::collections::BTreeMap;
use std::path::Path;

use git2::{Delta, DiffFindOptions, DiffOptions, ErrorCode, ObjectType, Oid, Repository, Sort};

use crate::error::{Error, Result};
use crate::models::SourceCommit;
use crate::source::{FileRead, RangeStart, RevisionRange, RevisionSource};

/// Revision source backed by a git repository.
pub struct GitSource {
    repo: Repository,
}

impl GitSource {
    fn resolve(&self, rev: &str) -> Result<Oid> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|_| Error::CommitNotFound(rev.to_string()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::CommitNotFound(rev.to_string()))?;
        Ok(commit.id())
    }

    fn find_commit(&self, id: &str) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(id).map_err(|_| Error::CommitNotFound(id.to_string()))?;
        self.repo
            .find_commit(oid)
            .map_err(|_| Error::CommitNotFound(id.to_string()))
    }
}

/// Decodes a diff path, setting aside paths that are not valid UTF-8.
fn utf8_path(bytes: Option<&[u8]>, non_utf8: &mut Vec<String>) -> Option<String> {
    let bytes = bytes?;
    match std::str::from_utf8(bytes) {
        Ok(path) => Some(path.to_string()),
        Err(_) => {
            let lossy = String::from_utf8_lossy(bytes).into_owned();
            if !non_utf8.contains(&lossy) {
                non_utf8.push(lossy);
            }
            None
        }
    }
}

impl RevisionSource for GitSource {
    fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path)
            .map_err(|_| Error::RepoNotFound(path.display().to_string()))?;
        Ok(Self { repo })
    }

    fn list_revisions(&self, range: &RevisionRange) -> Result<Vec<String>> {
        let end = self.resolve(&range.end)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(end)?;

        match &range.start {
            RangeStart::Root => {}
            RangeStart::From(rev) => {
                let start = self.repo.find_commit(self.resolve(rev)?)?;
                for parent in start.parent_ids() {
                    revwalk.hide(parent)?;
                }
            }
            RangeStart::After(rev) => revwalk.hide(self.resolve(rev)?)?,
        }

        let mut revs = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            if commit.parent_count() > 1 {
                tracing::debug!("Skipping merge commit {}", oid);
                continue;
            }
            revs.push(oid.to_string());
        }

        Ok(revs)
    }

    fn commit_metadata(&self, id: &str) -> Result<SourceCommit> {
        let commit = self.find_commit(id)?;
        let tree = commit.tree()?;

        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };

        // Copies from unmodified files need the unmodified entries in the diff.
        let mut diff = self.repo.diff_tree_to_tree(
            parent_tree.as_ref(),
            Some(&tree),
            Some(DiffOptions::new().include_unmodified(true)),
        )?;
        diff.find_similar(Some(
            DiffFindOptions::new()
                .renames(true)
                .copies(true)
                .copies_from_unmodified(true),
        ))?;

        let mut touched = Vec::new();
        let mut copies = BTreeMap::new();
        let mut non_utf8_paths = Vec::new();

        for delta in diff.deltas() {
            let status = delta.status();
            if matches!(status, Delta::Unmodified | Delta::Ignored | Delta::Untracked) {
                continue;
            }

            let old_path = utf8_path(delta.old_file().path_bytes(), &mut non_utf8_paths);
            let new_path = utf8_path(delta.new_file().path_bytes(), &mut non_utf8_paths);

            match status {
                Delta::Deleted => touched.extend(old_path),
                Delta::Renamed => {
                    if let (Some(old), Some(new)) = (old_path, new_path) {
                        copies.insert(new.clone(), old.clone());
                        touched.push(new);
                        touched.push(old);
                    }
                }
                Delta::Copied => {
                    if let (Some(old), Some(new)) = (old_path, new_path) {
                        copies.insert(new.clone(), old);
                        touched.push(new);
                    }
                }
                _ => touched.extend(new_path),
            }
        }

        let time = commit.committer().when();

        Ok(SourceCommit {
            id: commit.id().to_string(),
            parents: commit.parent_ids().map(|p| p.to_string()).collect(),
            description: commit.message().unwrap_or("").trim_end().to_string(),
            time: time.seconds(),
            offset_minutes: time.offset_minutes(),
            touched,
            copies,
            non_utf8_paths,
        })
    }

    fn read(&self, path: &str, id: &str) -> Result<FileRead> {
        let commit = self.find_commit(id)?;
        let tree = commit.tree()?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(FileRead::Absent),
            Err(e) => return Err(e.into()),
        };

        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(FileRead::Absent);
        }

        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(FileRead::Present(blob.content().to_vec()))
    }
}
