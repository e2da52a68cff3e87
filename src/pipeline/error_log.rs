//! Append-only log of commits that failed to replay.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::models::SourceCommit;

pub struct ErrorLog {
    file: File,
}

impl ErrorLog {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    /// Appends `<id> - <parents>` for a commit that could not be replayed.
    pub fn record(&mut self, commit: &SourceCommit) -> Result<()> {
        writeln!(self.file, "{} - {}", commit.id, commit.parents.join(" "))?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("errors.txt");
        let commit = SourceCommit {
            id: "a".repeat(40),
            parents: vec!["b".repeat(40)],
            description: String::new(),
            time: 0,
            offset_minutes: 0,
            touched: Vec::new(),
            copies: BTreeMap::new(),
            non_utf8_paths: Vec::new(),
        };

        ErrorLog::open(&path).unwrap().record(&commit).unwrap();
        ErrorLog::open(&path).unwrap().record(&commit).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let expected = format!("{} - {}\n", "a".repeat(40), "b".repeat(40));
        assert_eq!(content, expected.repeat(2));
    }
}
