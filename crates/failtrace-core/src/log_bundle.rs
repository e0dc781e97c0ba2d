use std::io::{Cursor, Read};

use serde::Serialize;
use thiserror::Error;

/// Suffix identifying plain-text job logs inside a run archive.
pub const LOG_ENTRY_SUFFIX: &str = ".txt";

#[derive(Debug, Error)]
pub enum LogArchiveError {
    #[error("log payload is not a readable zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to read log entry `{name}`: {source}")]
    Entry {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Every text entry of one run's log archive, concatenated in archive order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogBundle {
    text: String,
    entry_count: usize,
}

impl LogBundle {
    /// Decodes a zip payload. Entries not ending in [`LOG_ENTRY_SUFFIX`] are
    /// skipped; invalid UTF-8 is replaced rather than rejected.
    pub fn from_zip_bytes(bytes: &[u8]) -> Result<Self, LogArchiveError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut bundle = Self::default();
        let mut buffer = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() || !entry.name().ends_with(LOG_ENTRY_SUFFIX) {
                continue;
            }
            buffer.clear();
            if let Err(source) = entry.read_to_end(&mut buffer) {
                return Err(LogArchiveError::Entry {
                    name: entry.name().to_string(),
                    source,
                });
            }
            bundle.push_entry(&String::from_utf8_lossy(&buffer));
        }
        Ok(bundle)
    }

    fn push_entry(&mut self, text: &str) {
        self.text.push_str(text);
        self.text.push('\n');
        self.entry_count += 1;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}
