//! Data types shared between the generator, the viewer and the server.
//!
//! - `commit`: SourceCommit mined from the original repository
//! - `blame`: Blame, BlameLine and BlameCommit for destination blame
//! - `view`: RenderedBlame, AttributedLine and Fragment for back-mapped output

pub mod blame;
pub mod commit;
pub mod view;

pub use blame::*;
pub use commit::*;
pub use view::*;
