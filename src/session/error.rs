// ABOUTME: Error types for session process management
// Defines error conditions that can occur when spawning and driving session processes

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("PTY creation failed: {0}")]
    PtyCreationFailed(String),

    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Resize failed: {0}")]
    ResizeFailed(String),

    #[error("Session input channel closed")]
    InputClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
