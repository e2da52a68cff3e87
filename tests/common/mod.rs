#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::thread::JoinHandle;

use axum::{
    Router,
    body::Bytes,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use git2::{Repository, ResetType, Signature, Sort, Time};
use regex::Regex;
use tempfile::TempDir;
use tokio::sync::oneshot;

use ultrablame::config::{CommentService, GenerateOptions};

/// A scratch original repository built commit by commit.
pub struct SourceRepo {
    pub dir: TempDir,
    pub repo: Repository,
    commits: i64,
}

impl SourceRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self {
            dir,
            repo,
            commits: 0,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) {
        let full = self.path().join(name);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, contents).unwrap();

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    pub fn remove(&self, name: &str) {
        let full = self.path().join(name);
        fs::remove_file(&full).unwrap();
        // Drop the directory if it is now empty, the root never is.
        if let Some(parent) = full.parent() {
            let _ = fs::remove_dir(parent);
        }

        let mut index = self.repo.index().unwrap();
        index.remove_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    pub fn copy(&self, from: &str, to: &str) {
        let contents = fs::read_to_string(self.path().join(from)).unwrap();
        self.write(to, &contents);
    }

    pub fn rename(&self, from: &str, to: &str) {
        self.copy(from, to);
        self.remove(from);
    }

    /// Writes a file whose name is not necessarily valid UTF-8.
    #[cfg(unix)]
    pub fn write_raw(&self, name: &[u8], contents: &str) {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = Path::new(OsStr::from_bytes(name));
        fs::write(self.path().join(name), contents).unwrap();

        let mut index = self.repo.index().unwrap();
        index.add_path(name).unwrap();
        index.write().unwrap();
    }

    /// Moves HEAD, the index and the working tree back to `id`.
    pub fn reset_hard(&self, id: &str) {
        let object = self
            .repo
            .find_object(git2::Oid::from_str(id).unwrap(), None)
            .unwrap();
        self.repo.reset(&object, ResetType::Hard, None).unwrap();
    }

    /// Commits the index on top of HEAD, one minute after the previous commit.
    pub fn commit(&mut self, message: &str) -> String {
        self.commit_with(message, None)
    }

    /// Commits the index with HEAD and `other` as parents.
    pub fn merge(&mut self, message: &str, other: &str) -> String {
        self.commit_with(message, Some(other))
    }

    fn commit_with(&mut self, message: &str, other: Option<&str>) -> String {
        self.commits += 1;
        let time = Time::new(1_700_000_000 + self.commits * 60, 60);
        let signature = Signature::new("Moz Illa", "milla@mozilla.org", &time).unwrap();

        let mut index = self.repo.index().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| self.repo.find_commit(oid).unwrap());
        let other = other.map(|id| {
            self.repo
                .find_commit(git2::Oid::from_str(id).unwrap())
                .unwrap()
        });
        let parents: Vec<&git2::Commit> = parent.iter().chain(other.iter()).collect();

        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parents,
            )
            .unwrap()
            .to_string()
    }
}

/// Options writing into `destination`, with the error log kept next to it.
pub fn options(source: &SourceRepo, destination: &Path) -> GenerateOptions {
    let mut options = GenerateOptions::new(source.path(), destination);
    options.error_log = destination.with_extension("errors.txt");
    options.workers = 2;
    options
}

pub fn destination_dir(tmp: &TempDir) -> PathBuf {
    tmp.path().join("repo")
}

/// Destination commits, oldest first.
pub fn destination_commits(path: &Path) -> Vec<(String, String)> {
    let repo = Repository::open(path).unwrap();
    let mut revwalk = repo.revwalk().unwrap();
    revwalk
        .set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)
        .unwrap();
    revwalk.push_head().unwrap();

    revwalk
        .map(|oid| {
            let commit = repo.find_commit(oid.unwrap()).unwrap();
            (
                commit.id().to_string(),
                commit.message().unwrap().to_string(),
            )
        })
        .collect()
}

/// Content of the error log written by [`options`] for `destination`.
pub fn error_log(destination: &Path) -> String {
    fs::read_to_string(destination.with_extension("errors.txt")).unwrap()
}

/// Content of `name` in the destination HEAD tree, `None` if absent.
pub fn head_file(path: &Path, name: &str) -> Option<String> {
    let repo = Repository::open(path).unwrap();
    let tree = repo.head().unwrap().peel_to_tree().unwrap();
    let entry = tree.get_path(Path::new(name)).ok()?;
    let blob = entry.to_object(&repo).unwrap().peel_to_blob().unwrap();
    Some(String::from_utf8(blob.content().to_vec()).unwrap())
}

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static LINE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"//[^\n]*").unwrap());

const SUPPORTED: [&str; 6] = ["c", "cpp", "h", "js", "jsm", "rs"];

async fn strip_comments(
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let name = query.get("file_name").cloned().unwrap_or_default();
    let supported = Path::new(&name)
        .extension()
        .is_some_and(|ext| SUPPORTED.contains(&ext.to_string_lossy().as_ref()));
    if !supported {
        return StatusCode::NOT_FOUND.into_response();
    }

    let text = String::from_utf8_lossy(&body).to_string();
    let stripped = BLOCK_COMMENT.replace_all(&text, "");
    let stripped = LINE_COMMENT.replace_all(&stripped, "").to_string();

    if stripped == text {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (StatusCode::OK, stripped).into_response()
    }
}

/// An axum app served from its own thread and runtime, so blocking
/// clients can call it from the test thread.
pub struct BackgroundServer {
    pub url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundServer {
    pub fn start(app: Router) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();

        let handle = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = rx.await;
                    })
                    .await
                    .unwrap();
            });
        });

        Self {
            url,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }
}

impl Drop for BackgroundServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// In-process stand-in for the comment-stripping service.
pub struct MockCommentService {
    server: BackgroundServer,
}

impl MockCommentService {
    pub fn start() -> Self {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route("/comment", post(strip_comments));
        Self {
            server: BackgroundServer::start(app),
        }
    }

    pub fn config(&self) -> CommentService {
        CommentService::Endpoint(self.server.url.clone())
    }
}

pub const HELLO_V1: &str = "#include <iostream>

/* main */
int main() {
    return 0;
}";

pub const HELLO_V2: &str = "#include <iostream>

/* main */
int main() {
    cout << \"Hello, world!\";
    return 0;
}";

pub const CIAO: &str = "function ciao(str) {
  // Comment one
  console.log(str);
}";
