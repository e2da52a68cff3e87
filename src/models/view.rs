//! Back-mapped blame of an original file.

use serde::Serialize;

/// A piece of an original line attributed to one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    /// Commit the text is attributed to, `None` for unattributed text
    pub commit: Option<String>,
    pub text: String,
}

/// One physical line of the original file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributedLine {
    /// Line number (1-indexed)
    pub number: usize,
    pub fragments: Vec<Fragment>,
}

impl AttributedLine {
    pub fn text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }
}

/// Summary of an original commit appearing in a rendered blame.
#[derive(Debug, Clone, Serialize)]
pub struct AttributedCommit {
    pub original: String,
    pub destination: String,
    pub summary: Option<String>,
    /// Commit date (RFC 3339), carried over from the original commit
    pub date: Option<String>,
    pub color: String,
}

/// Response for a back-mapped blame request.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedBlame {
    pub path: String,
    /// Destination revision the blame was computed at
    pub revision: String,
    /// Original commit mapped from `revision`
    pub original_revision: String,
    pub lines: Vec<AttributedLine>,
    pub commits: Vec<AttributedCommit>,
}
