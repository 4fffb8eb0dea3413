// ABOUTME: Error returned by AppHandle calls once the coordinator has stopped

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Coordinator has stopped")]
    Stopped,
}
