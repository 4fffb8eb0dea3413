// ABOUTME: Error types for non-interactive tool invocations
// Every variant is recoverable; callers fall back or skip instead of propagating

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("{0} does not accept a piped prompt")]
    Unsupported(&'static str),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tool exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Tool timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
