//! Blame endpoints.
//!
//! GET /api/v1/blame?path=<path>&rev=<optional>
//! GET /blame?path=<path>&rev=<optional>
//!
//! `rev` is a destination revision (default `HEAD`). Lines of the original
//! file are attributed to original commits.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;

use super::{SharedViewer, default_rev};
use crate::error::Result;
use crate::models::RenderedBlame;
use crate::viewer;

pub fn routes(viewer: SharedViewer) -> Router {
    Router::new()
        .route("/api/v1/blame", get(get_blame))
        .route("/blame", get(get_blame_html))
        .with_state(viewer)
}

#[derive(Debug, Deserialize)]
struct BlameQuery {
    path: String,
    #[serde(default = "default_rev")]
    rev: String,
}

async fn get_blame(
    State(viewer): State<SharedViewer>,
    Query(query): Query<BlameQuery>,
) -> Result<Json<RenderedBlame>> {
    let rendered = viewer.annotate(&query.rev, &query.path)?;
    Ok(Json(rendered))
}

async fn get_blame_html(
    State(viewer): State<SharedViewer>,
    Query(query): Query<BlameQuery>,
) -> Result<Html<String>> {
    let rendered = viewer.annotate(&query.rev, &query.path)?;
    Ok(Html(viewer::render_html(&rendered)))
}
