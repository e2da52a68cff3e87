use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use super::{SharedViewer, default_rev};
use crate::error::Result;

pub fn routes(viewer: SharedViewer) -> Router {
    Router::new()
        .route("/api/v1/files", get(get_files))
        .with_state(viewer)
}

#[derive(Debug, Deserialize)]
struct FilesQuery {
    #[serde(default = "default_rev")]
    rev: String,
}

async fn get_files(
    State(viewer): State<SharedViewer>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Vec<String>>> {
    let files = viewer.files(&query.rev)?;
    Ok(Json(files))
}
