//! Destination repository access.
//!
//! - `repository`: open/init, staging and sealing of destination commits
//! - `history`: oldest-first walk of destination history
//! - `blame`: per-line attribution of destination files

pub mod blame;
pub mod history;
pub mod repository;

pub use blame::BlameEngine;
pub use repository::{Change, OutputRepository};
