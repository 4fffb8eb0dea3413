// ABOUTME: Error types for journal persistence and export

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No journal entries between {start} and {end}")]
    NoEntries { start: String, end: String },
}
