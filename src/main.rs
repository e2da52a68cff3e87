//! UltraBlame - token-level blame for git repositories
//!
//! # Usage
//! ```bash
//! ultrablame generate ./repo ./repo-tokens            # Transcode history
//! ultrablame view ./repo ./repo-tokens src/main.c HEAD
//! ultrablame serve ./repo ./repo-tokens --open        # Browse blame over HTTP
//! ultrablame map ./repo-tokens --original <ID>        # Translate commit ids
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ultrablame::config::{self, CommentService, GenerateOptions};
use ultrablame::git::history::walk_history;
use ultrablame::git::{BlameEngine, OutputRepository};
use ultrablame::mapping::CommitMapping;
use ultrablame::pipeline;
use ultrablame::routes;
use ultrablame::source::{GitSource, RangeStart};
use ultrablame::viewer::{self, OutputFormat, Viewer};

/// Token-level blame for git repositories
#[derive(Parser)]
#[command(name = "ultrablame")]
#[command(about = "Token-level blame for git repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcode the history of SOURCE into DESTINATION
    Generate(GenerateArgs),
    /// Print the blame of an original file reconstructed from DESTINATION
    View {
        source: PathBuf,
        destination: PathBuf,
        /// File path, relative to the repository root
        path: String,
        /// Destination revision
        rev: String,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        #[arg(long, value_enum, default_value_t)]
        blame_engine: BlameEngine,
    },
    /// Serve reconstructed blame over HTTP
    Serve {
        source: PathBuf,
        destination: PathBuf,
        /// Port to run the server on
        #[arg(short, long, default_value = "3001")]
        port: u16,
        /// Open browser automatically after starting
        #[arg(short, long)]
        open: bool,
        #[arg(long, value_enum, default_value_t)]
        blame_engine: BlameEngine,
    },
    /// Print the destination to original commit mapping
    Map {
        destination: PathBuf,
        /// Print the destination commit of this original commit
        #[arg(long, conflicts_with = "destination_id")]
        original: Option<String>,
        /// Print the original commit of this destination commit
        #[arg(long = "destination", id = "destination_id")]
        destination_id: Option<String>,
    },
}

#[derive(Args)]
struct GenerateArgs {
    source: PathBuf,
    destination: PathBuf,
    /// First original revision to transcode (inclusive)
    #[arg(long)]
    rev_start: Option<String>,
    /// Last original revision to transcode
    #[arg(long, default_value = "HEAD")]
    rev_end: String,
    /// Maximum number of commits to transcode in this run
    #[arg(long)]
    limit: Option<usize>,
    /// Copy files as they are instead of one token per line
    #[arg(long)]
    no_tokenize: bool,
    /// Strip comments through the comment service before tokenizing
    #[arg(long)]
    remove_comments: bool,
    /// Use an already running comment service
    #[arg(long, env = "ULTRABLAME_COMMENT_SERVICE_URL")]
    comment_service_url: Option<String>,
    /// Command started as the comment service
    #[arg(
        long,
        env = "ULTRABLAME_COMMENT_SERVICE_COMMAND",
        default_value = config::DEFAULT_COMMENT_SERVICE_COMMAND
    )]
    comment_service_command: String,
    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(short, long, env = "ULTRABLAME_JOBS")]
    jobs: Option<usize>,
    /// File receiving the commits that failed to transcode
    #[arg(long, default_value = config::DEFAULT_ERROR_LOG)]
    error_log: PathBuf,
}

impl GenerateArgs {
    fn into_options(self) -> GenerateOptions {
        let mut options = GenerateOptions::new(self.source, self.destination);
        if let Some(rev) = self.rev_start {
            options.rev_start = RangeStart::From(rev);
        }
        options.rev_end = self.rev_end;
        options.limit = self.limit;
        options.tokenize = !self.no_tokenize;
        options.remove_comments = self.remove_comments;
        options.comment_service = match self.comment_service_url {
            Some(url) => CommentService::Endpoint(url),
            None => CommentService::Spawn(self.comment_service_command),
        };
        if let Some(jobs) = self.jobs {
            options.workers = jobs;
        }
        options.error_log = self.error_log;
        options
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Generate(args) => {
            let completed = pipeline::generate(&args.into_options())?;
            if completed {
                println!("✓ Transcoded the whole range");
            } else {
                println!("✗ Stopped at the limit, run again to continue");
            }
        }
        Commands::View {
            source,
            destination,
            path,
            rev,
            format,
            blame_engine,
        } => {
            let viewer: Viewer<GitSource> = Viewer::open(&source, &destination, blame_engine)?;
            let rendered = viewer.annotate(&rev, &path)?;
            println!("{}", viewer::render(&rendered, format)?);
        }
        Commands::Serve {
            source,
            destination,
            port,
            open,
            blame_engine,
        } => {
            let viewer = Viewer::open(&source, &destination, blame_engine)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(serve(Arc::new(viewer), port, open))?;
        }
        Commands::Map {
            destination,
            original,
            destination_id,
        } => {
            let output = OutputRepository::open(&destination)?;
            let mapping = output.with_repo(CommitMapping::build)?;

            if let Some(original) = original {
                println!("{}", mapping.destination(&original)?);
            } else if let Some(destination_id) = destination_id {
                let oid = output.resolve(&destination_id)?;
                println!("{}", mapping.original(&oid.to_string())?);
            } else {
                for entry in output.with_repo(walk_history)? {
                    let id = entry.oid.to_string();
                    println!("{} {}", id, mapping.original(&id)?);
                }
            }
        }
    }

    Ok(())
}

async fn serve(viewer: routes::SharedViewer, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let app = routes::create_router(viewer).layer(TraceLayer::new_for_http());

    let addr = format!("127.0.0.1:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("✗ Failed to bind to port {}: {}", port, e);
            eprintln!("  Try a different port with --port <PORT>");
            std::process::exit(1);
        }
    };

    let url = format!("http://127.0.0.1:{}", port);
    println!();
    println!("  UltraBlame server: {}", url);
    println!("  Blame page:        {}/blame?path=<PATH>&rev=<REV>", url);
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    if open_browser && let Err(e) = open::that(format!("{}/api/v1/files", url)) {
        eprintln!("  Warning: Could not open browser: {}", e);
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        println!("\n  Shutting down...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
