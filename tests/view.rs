mod common;

use std::process::Command;
use std::sync::Arc;

use git2::{Repository, Signature};
use reqwest::StatusCode;
use tempfile::TempDir;

use common::*;
use ultrablame::git::BlameEngine;
use ultrablame::models::{AttributedLine, RenderedBlame};
use ultrablame::pipeline::generate;
use ultrablame::routes;
use ultrablame::source::GitSource;
use ultrablame::viewer::{self, Viewer};

struct Fixture {
    source: SourceRepo,
    _tmp: TempDir,
    dest: std::path::PathBuf,
    rev1: String,
    rev2: String,
}

fn hello_fixture() -> Fixture {
    let mut source = SourceRepo::new();
    source.write("file.cpp", HELLO_V1);
    let rev1 = source.commit("Commit A file.cpp");
    source.write("file.cpp", HELLO_V2);
    source.write("file.jsm", CIAO);
    let rev2 = source.commit("Commit M file.cpp A file.jsm");

    let tmp = TempDir::new().unwrap();
    let dest = destination_dir(&tmp);
    assert!(generate(&options(&source, &dest)).unwrap());

    Fixture {
        source,
        _tmp: tmp,
        dest,
        rev1,
        rev2,
    }
}

fn viewer(fixture: &Fixture, engine: BlameEngine) -> Viewer<GitSource> {
    Viewer::open(fixture.source.path(), &fixture.dest, engine).unwrap()
}

/// Commits of the fragments of `line` that carry code.
fn token_commits(line: &AttributedLine) -> Vec<Option<&str>> {
    line.fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .map(|f| f.commit.as_deref())
        .collect()
}

fn assert_hello_attribution(rendered: &RenderedBlame, fixture: &Fixture) {
    let texts: Vec<String> = rendered.lines.iter().map(|l| l.text()).collect();
    let expected: Vec<&str> = HELLO_V2.lines().collect();
    assert_eq!(texts, expected);

    let rev1 = Some(fixture.rev1.as_str());
    let rev2 = Some(fixture.rev2.as_str());

    for number in [1, 3, 4, 6, 7] {
        let commits = token_commits(&rendered.lines[number - 1]);
        assert!(!commits.is_empty());
        assert!(commits.iter().all(|c| *c == rev1), "line {}", number);
    }

    let line5 = token_commits(&rendered.lines[4]);
    assert!(!line5.is_empty());
    assert!(line5.iter().all(|c| *c == rev2));
}

#[test]
fn test_annotate_head_maps_back_to_original_commits() {
    let fixture = hello_fixture();
    let viewer = viewer(&fixture, BlameEngine::Libgit2);

    let rendered = viewer.annotate("HEAD", "file.cpp").unwrap();
    assert_eq!(rendered.original_revision, fixture.rev2);
    assert_hello_attribution(&rendered, &fixture);

    let originals: Vec<&str> = rendered.commits.iter().map(|c| c.original.as_str()).collect();
    assert_eq!(originals.len(), 2);
    assert!(originals.contains(&fixture.rev1.as_str()));
    assert!(originals.contains(&fixture.rev2.as_str()));

    let commit2 = rendered
        .commits
        .iter()
        .find(|c| c.original == fixture.rev2)
        .unwrap();
    assert_eq!(commit2.color, viewer::commit_color(&fixture.rev2));
    assert_eq!(
        commit2.summary.as_deref(),
        Some("Commit M file.cpp A file.jsm")
    );
    assert!(commit2.date.is_some());
}

#[test]
fn test_annotate_older_revision() {
    let fixture = hello_fixture();
    let viewer = viewer(&fixture, BlameEngine::Libgit2);
    let first = destination_commits(&fixture.dest)[0].0.clone();

    let rendered = viewer.annotate(&first, "file.cpp").unwrap();
    assert_eq!(rendered.original_revision, fixture.rev1);

    let texts: Vec<String> = rendered.lines.iter().map(|l| l.text()).collect();
    assert_eq!(texts, HELLO_V1.lines().collect::<Vec<_>>());
    assert!(
        rendered
            .lines
            .iter()
            .flat_map(|l| l.fragments.iter())
            .all(|f| f.commit.as_deref() == Some(fixture.rev1.as_str()))
    );
}

#[test]
fn test_annotate_with_git_cli_engine() {
    if Command::new("git").arg("--version").output().is_err() {
        return;
    }

    let fixture = hello_fixture();
    let viewer = viewer(&fixture, BlameEngine::Git);

    let rendered = viewer.annotate("HEAD", "file.cpp").unwrap();
    assert_hello_attribution(&rendered, &fixture);
}

#[test]
fn test_annotate_missing_path_is_not_found() {
    let fixture = hello_fixture();
    let viewer = viewer(&fixture, BlameEngine::Libgit2);
    let first = destination_commits(&fixture.dest)[0].0.clone();

    let err = viewer.annotate(&first, "file.jsm").unwrap_err();
    assert!(err.is_not_found(), "{}", err);

    let err = viewer.annotate("HEAD", "nope.cpp").unwrap_err();
    assert!(err.is_not_found(), "{}", err);
}

#[test]
fn test_annotate_without_trailer_is_not_found() {
    let fixture = hello_fixture();

    // Add a commit that was not produced by the generator.
    let repo = Repository::open(&fixture.dest).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    let signature = Signature::now("Someone", "someone@example.com").unwrap();
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        "Manual commit",
        &head.tree().unwrap(),
        &[&head],
    )
    .unwrap();

    let viewer = viewer(&fixture, BlameEngine::Libgit2);
    let err = viewer.annotate("HEAD", "file.cpp").unwrap_err();
    assert!(err.is_not_found(), "{}", err);
}

#[test]
fn test_annotate_rejects_escaping_paths() {
    let fixture = hello_fixture();
    let viewer = viewer(&fixture, BlameEngine::Libgit2);

    assert!(matches!(
        viewer.annotate("HEAD", "../file.cpp"),
        Err(ultrablame::Error::InvalidPath(_))
    ));
}

#[test]
fn test_mapping_cache_follows_head() {
    let mut fixture = hello_fixture();
    let viewer = viewer(&fixture, BlameEngine::Libgit2);
    assert_eq!(viewer.mapping().unwrap().len(), 2);

    fixture.source.write("file.cpp", HELLO_V1);
    let rev3 = fixture.source.commit("Commit M file.cpp");
    assert!(generate(&options(&fixture.source, &fixture.dest)).unwrap());

    let mapping = viewer.mapping().unwrap();
    assert_eq!(mapping.len(), 3);
    assert!(mapping.destination(&rev3).is_ok());
}

#[test]
fn test_html_page() {
    let fixture = hello_fixture();

    let html = viewer::html(fixture.source.path(), &fixture.dest, "HEAD", "file.cpp").unwrap();
    assert!(html.starts_with("<html>"));
    assert!(html.contains(&format!(
        "<a href=\"{}\" style=\"color: {};\">cout </a>",
        fixture.rev2,
        viewer::commit_color(&fixture.rev2)
    )));
    assert!(html.contains("&lt;"));
    assert!(!html.contains("<iostream>"));
}

#[test]
fn test_blame_routes() {
    let fixture = hello_fixture();
    let app = routes::create_router(Arc::new(viewer(&fixture, BlameEngine::Libgit2)));
    let server = BackgroundServer::start(app);

    let response =
        reqwest::blocking::get(format!("{}/api/v1/blame?path=file.cpp", server.url)).unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&response.bytes().unwrap()).unwrap();
    assert_eq!(body["path"], "file.cpp");
    assert_eq!(body["original_revision"], fixture.rev2.as_str());
    assert_eq!(body["lines"].as_array().unwrap().len(), 7);

    let response =
        reqwest::blocking::get(format!("{}/blame?path=file.cpp&rev=HEAD", server.url)).unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = String::from_utf8(response.bytes().unwrap().to_vec()).unwrap();
    assert!(page.contains("<pre>"));

    let response = reqwest::blocking::get(format!("{}/api/v1/files", server.url)).unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let files: Vec<String> = serde_json::from_slice(&response.bytes().unwrap()).unwrap();
    assert_eq!(files, vec!["file.cpp", "file.jsm"]);

    let response =
        reqwest::blocking::get(format!("{}/api/v1/blame?path=nope.cpp", server.url)).unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response =
        reqwest::blocking::get(format!("{}/api/v1/blame?path=../x.cpp", server.url)).unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
