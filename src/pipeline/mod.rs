//! History transcoding.
//!
//! Mines commits from the original repository and replays each of them
//! into the destination repository with every touched file transformed
//! (comments stripped and/or tokenized). Runs resume from the original
//! commit recorded in the destination HEAD, so re-running the same command
//! continues where the previous run stopped.
//!
//! Metadata mining and per-file transforms run on a bounded worker pool;
//! destination commits are built strictly one after the other.

pub mod error_log;
pub mod plan;

use git2::Oid;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;

use crate::comments::{CommentService, CommentStripper};
use crate::config::{GenerateOptions, Identity};
use crate::error::{Error, Result};
use crate::git::{Change, OutputRepository};
use crate::mapping::{self, CommitMapping};
use crate::models::SourceCommit;
use crate::source::{
    FileRead, GitSource, RangeStart, RevisionRange, RevisionSource, SourcePool,
};
use crate::tokenize::tokenize;

use error_log::ErrorLog;
use plan::FileAction;

/// Revisions handed to one mining task.
const CHUNK_SIZE: usize = 256;

/// Transcodes a git history with the given options.
///
/// Returns `false` when `limit` cut the run short and another run is needed
/// to reach the end of the range.
pub fn generate(options: &GenerateOptions) -> Result<bool> {
    Generator::<GitSource>::new(options.clone())?.run()
}

pub struct Generator<S> {
    options: GenerateOptions,
    pool: SourcePool<S>,
    workers: rayon::ThreadPool,
    output: OutputRepository,
}

impl<S: RevisionSource> Generator<S> {
    pub fn new(options: GenerateOptions) -> Result<Self> {
        let size = options.workers.max(1);
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("ultrablame-worker-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build worker pool: {}", e)))?;
        let pool = SourcePool::open(&options.source, size)?;
        let output = OutputRepository::open_or_init(&options.destination)?;

        Ok(Self {
            options,
            pool,
            workers,
            output,
        })
    }

    pub fn run(&self) -> Result<bool> {
        // Lives until the end of the run, whatever the outcome.
        let service = if self.options.remove_comments {
            Some(CommentService::start(&self.options.comment_service)?)
        } else {
            None
        };
        let stripper = service.as_ref().map(CommentService::stripper);

        let last = self.output.head_original()?;
        let start = match &last {
            Some(last) => {
                tracing::info!("Resuming after original commit {}", last);
                RangeStart::After(last.clone())
            }
            None => self.options.rev_start.clone(),
        };
        let range = RevisionRange::new(start, self.options.rev_end.clone());

        tracing::info!("Getting revs from {:?} to {}...", range.start, range.end);
        let mut revs = self.pool.acquire()?.list_revisions(&range)?;

        // Side-branch commits replayed by an earlier run are not ancestors
        // of the last one, so the listing can return them again.
        if last.is_some() {
            let mapping = self.output.with_repo(CommitMapping::build)?;
            revs.retain(|rev| mapping.destination(rev).is_err());
        }

        let mut completed = true;
        if let Some(limit) = self.options.limit
            && revs.len() > limit
        {
            completed = false;
            revs.truncate(limit);
        }

        tracing::info!("Mining {} commits...", revs.len());
        let commits = self.mine(&revs)?;

        tracing::info!("Converting {} commits...", commits.len());
        let mut error_log = ErrorLog::open(&self.options.error_log)?;
        let bar = ProgressBar::new(commits.len() as u64);

        for commit in &commits {
            if commit.is_merge() {
                return Err(Error::MergeUnsupported {
                    id: commit.id.clone(),
                    parents: commit.parents.len(),
                });
            }

            match self.convert(commit, stripper.as_ref()) {
                Ok(oid) => tracing::debug!("Sealed {} for original {}", oid, commit.id),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(
                        "Error during transformation of {} (parents {:?}): {}",
                        commit.id,
                        commit.parents,
                        e
                    );
                    error_log.record(commit)?;
                    self.output.reset_to_head()?;
                }
            }

            bar.inc(1);
        }
        bar.finish_and_clear();

        if !completed {
            tracing::info!("Stopped after {} commits, run again to continue", commits.len());
        }
        Ok(completed)
    }

    /// Fetches metadata for `revs`, in parallel, keeping their order.
    fn mine(&self, revs: &[String]) -> Result<Vec<SourceCommit>> {
        let bar = ProgressBar::new(revs.len().div_ceil(CHUNK_SIZE) as u64);

        let chunks = self.workers.install(|| {
            revs.par_chunks(CHUNK_SIZE)
                .progress_with(bar)
                .map(|chunk| {
                    let source = self.pool.acquire()?;
                    chunk
                        .iter()
                        .map(|id| source.commit_metadata(id))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(chunks.into_iter().flatten().collect())
    }

    /// Builds and seals the destination commit for `commit`.
    fn convert(&self, commit: &SourceCommit, stripper: Option<&CommentStripper>) -> Result<Oid> {
        tracing::info!("Transforming commit {}", commit.id);

        if let Some(path) = commit.non_utf8_paths.first() {
            return Err(Error::InvalidPath(format!("{} is not valid UTF-8", path)));
        }

        let actions = plan::plan(commit);
        let changes = self.workers.install(|| {
            actions
                .par_iter()
                .map(|action| self.transform(commit, action, stripper))
                .collect::<Result<Vec<_>>>()
        })?;

        self.output.stage(&changes)?;

        let message = mapping::commit_message(&commit.description, &commit.id);
        self.output
            .seal(&message, &self.options.identity, &Identity::time_of(commit))
            .map_err(|e| match e {
                Error::Git(source) => Error::Seal {
                    original: commit.id.clone(),
                    source,
                },
                other => other,
            })
    }

    fn transform(
        &self,
        commit: &SourceCommit,
        action: &FileAction,
        stripper: Option<&CommentStripper>,
    ) -> Result<Change> {
        let read = self.pool.acquire()?.read(&action.path, &commit.id)?;

        let mut content = match read {
            FileRead::Absent => {
                tracing::debug!("{} is gone in {}, removing it", action.path, commit.id);
                return Ok(Change::Remove {
                    path: action.path.clone(),
                });
            }
            FileRead::Present(content) => content,
        };

        if let Some(from) = &action.copied_from {
            tracing::debug!("{} copied from {} in {}", action.path, from, commit.id);
        }

        if let Some(stripper) = stripper {
            content = stripper.strip(&action.path, content);
        }
        if self.options.tokenize {
            content = tokenize(&action.path, &content);
        }

        Ok(Change::Write {
            path: action.path.clone(),
            content,
        })
    }
}
