//! HTTP routes of the blame server.
//!
//! - `blame`: back-mapped blame as JSON (`/api/v1/blame`) or HTML (`/blame`)
//! - `tree`: files of a destination revision (`/api/v1/files`)

pub mod blame;
pub mod tree;

use std::sync::Arc;

use axum::Router;

use crate::viewer::Viewer;

pub type SharedViewer = Arc<Viewer>;

pub fn create_router(viewer: SharedViewer) -> Router {
    Router::new()
        .merge(blame::routes(viewer.clone()))
        .merge(tree::routes(viewer))
}

fn default_rev() -> String {
    "HEAD".to_string()
}
