//! Blame of original files reconstructed from transformed-file blame.
//!
//! Each blame line of the transformed file is one token. Tokens keep their
//! relative order in the original text, so they are located there with a
//! forward-only search: the text from one token up to the next belongs to
//! the commit that last changed the first one. Spans are then split into
//! the physical lines of the original file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use git2::Oid;
use palette::{FromColor, Lch, Srgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::git::repository::checked_relative_path;
use crate::git::{BlameEngine, OutputRepository, blame};
use crate::mapping::CommitMapping;
use crate::models::{AttributedCommit, AttributedLine, BlameLine, Fragment, RenderedBlame};
use crate::source::{FileRead, GitSource, RevisionSource};

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Html,
    Json,
}

/// Accumulates fragments per physical line.
#[derive(Default)]
struct LineBuilder {
    lines: Vec<Vec<Fragment>>,
    current: usize,
}

impl LineBuilder {
    fn push(&mut self, commit: Option<&str>, segment: &str) {
        let pieces: Vec<&str> = segment.lines().collect();
        let last = pieces.len().saturating_sub(1);

        for (i, piece) in pieces.into_iter().enumerate() {
            if self.lines.len() <= self.current {
                self.lines.resize_with(self.current + 1, Vec::new);
            }
            self.lines[self.current].push(Fragment {
                commit: commit.map(String::from),
                text: piece.to_string(),
            });
            if i != last {
                self.current += 1;
            }
        }

        if segment.ends_with('\n') {
            self.current += 1;
        }
    }

    fn finish(self) -> Vec<AttributedLine> {
        self.lines
            .into_iter()
            .enumerate()
            .map(|(i, fragments)| AttributedLine {
                number: i + 1,
                fragments,
            })
            .collect()
    }
}

/// Attributes every line of `original` using the blame of its transformed form.
///
/// Fragments carry the commit ids found in `blame`. Text before the first
/// located token has no commit. A blame line whose content cannot be found
/// after the previous match is skipped.
pub fn back_map(blame: &[BlameLine], original: &str) -> Vec<AttributedLine> {
    if blame.is_empty() {
        return Vec::new();
    }

    let mut builder = LineBuilder::default();
    let mut cursor = 0;
    let mut span_start = 0;
    let mut owner: Option<&str> = None;

    for line in blame {
        let Some(found) = original[cursor..].find(line.context.as_str()) else {
            tracing::debug!(
                "Token {:?} of line {} not found after offset {}",
                line.context,
                line.lineno_now,
                cursor
            );
            continue;
        };

        let start = cursor + found;
        builder.push(owner, &original[span_start..start]);

        span_start = start;
        cursor = start + line.context.len();
        owner = Some(line.commit.as_str());
    }
    builder.push(owner, &original[span_start..]);

    builder.finish()
}

/// Stable color for a commit, as `#rrggbb`.
pub fn commit_color(id: &str) -> String {
    // FNV-1a, so the color only depends on the id.
    let seed = id.bytes().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ b as u64).wrapping_mul(0x100000001b3)
    });
    let mut rng = StdRng::seed_from_u64(seed);
    let hue = rng.gen_range(0.0f32..360.0f32);

    let color = Lch::new(55.0f32, 70.0f32, hue);
    let srgb: Srgb<f32> = Srgb::from_color(color);
    let (r, g, b) = srgb.into_components();
    let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;

    format!("#{:02x}{:02x}{:02x}", to_u8(r), to_u8(g), to_u8(b))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_html(rendered: &RenderedBlame) -> String {
    let colors: HashMap<&str, &str> = rendered
        .commits
        .iter()
        .map(|c| (c.original.as_str(), c.color.as_str()))
        .collect();

    let mut html = String::from("<html>\n<head>\n<title>Blame</title>\n</head>\n<body>\n<pre>\n");

    for line in &rendered.lines {
        for fragment in &line.fragments {
            match &fragment.commit {
                Some(commit) => {
                    let color = colors.get(commit.as_str()).copied().unwrap_or("#000000");
                    html.push_str(&format!(
                        "<a href=\"{}\" style=\"color: {};\">{}</a>",
                        commit,
                        color,
                        escape_html(&fragment.text)
                    ));
                }
                None => html.push_str(&escape_html(&fragment.text)),
            }
        }
        html.push('\n');
    }

    html.push_str("</pre>\n</body>\n</html>\n");
    html
}

pub fn render(rendered: &RenderedBlame, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Html => Ok(render_html(rendered)),
        OutputFormat::Json => serde_json::to_string_pretty(rendered)
            .map_err(|e| Error::Internal(format!("Failed to serialize blame: {}", e))),
    }
}

/// Mapping built for a given destination HEAD.
struct MappingCache {
    head: Option<Oid>,
    mapping: Arc<CommitMapping>,
}

/// Back-maps blame between an original repository and its destination.
pub struct Viewer<S = GitSource> {
    source: Mutex<S>,
    output: OutputRepository,
    engine: BlameEngine,
    cache: Mutex<Option<MappingCache>>,
}

impl<S: RevisionSource> Viewer<S> {
    pub fn open(source: &Path, destination: &Path, engine: BlameEngine) -> Result<Self> {
        Ok(Self {
            source: Mutex::new(S::open(source)?),
            output: OutputRepository::open(destination)?,
            engine,
            cache: Mutex::new(None),
        })
    }

    /// Commit mapping of the destination, rebuilt when HEAD has moved.
    pub fn mapping(&self) -> Result<Arc<CommitMapping>> {
        let head = self.output.head()?;
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;

        if let Some(cached) = cache.as_ref()
            && cached.head == head
        {
            return Ok(Arc::clone(&cached.mapping));
        }

        let mapping = Arc::new(self.output.with_repo(CommitMapping::build)?);
        *cache = Some(MappingCache {
            head,
            mapping: Arc::clone(&mapping),
        });
        Ok(mapping)
    }

    /// Reconstructs the blame of `path` at destination revision `rev`.
    pub fn annotate(&self, rev: &str, path: &str) -> Result<RenderedBlame> {
        checked_relative_path(path)?;

        let oid = self.output.resolve(rev)?;
        let destination = oid.to_string();
        let mapping = self.mapping()?;
        let original_revision = mapping
            .original(&destination)
            .map_err(|_| Error::MissingTrailer(destination.clone()))?
            .to_string();

        let file_blame = self
            .output
            .with_repo(|repo| blame::blame(repo, oid, path, self.engine))?;

        let read = {
            let source = self
                .source
                .lock()
                .map_err(|_| Error::Internal("Lock poisoned".to_string()))?;
            source.read(path, &original_revision)?
        };
        let content = match read {
            FileRead::Present(content) => content,
            FileRead::Absent => {
                return Err(Error::PathNotFound(format!(
                    "{} at {}",
                    path, original_revision
                )));
            }
        };
        let text = String::from_utf8_lossy(&content);

        let mut lines = back_map(&file_blame.lines, &text);

        let mut commits: Vec<AttributedCommit> = Vec::new();
        for fragment in lines.iter_mut().flat_map(|l| l.fragments.iter_mut()) {
            let Some(blamed) = fragment.commit.take() else {
                continue;
            };
            let original = mapping.original(&blamed)?.to_string();

            if !commits.iter().any(|c| c.original == original) {
                let record = file_blame.commits.get(&blamed);
                commits.push(AttributedCommit {
                    color: commit_color(&original),
                    summary: record.and_then(|c| c.summary.clone()),
                    date: record
                        .and_then(|c| c.committer_time)
                        .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
                        .map(|d| d.to_rfc3339()),
                    original: original.clone(),
                    destination: blamed,
                });
            }
            fragment.commit = Some(original);
        }

        Ok(RenderedBlame {
            path: path.to_string(),
            revision: destination,
            original_revision,
            lines,
            commits,
        })
    }

    /// Files present in the destination tree at `rev`.
    pub fn files(&self, rev: &str) -> Result<Vec<String>> {
        self.output.tree_paths(rev)
    }
}

/// Renders the back-mapped blame of `path` at destination revision `rev` as HTML.
pub fn html(source: &Path, destination: &Path, rev: &str, path: &str) -> Result<String> {
    let viewer: Viewer<GitSource> = Viewer::open(source, destination, BlameEngine::default())?;
    Ok(render_html(&viewer.annotate(rev, path)?))
}
