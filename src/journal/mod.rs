// ABOUTME: Passive activity journal: capture buffers, day-file store, periodic summarizer, weekly export
// Session output is buffered per session and periodically condensed into per-day markdown files

pub mod buffer;
pub mod error;
pub mod store;
pub mod summarizer;
pub mod weekly;

pub use buffer::{strip_control, Collection, JournalBuffers, Snapshot, Utf8Carry};
pub use error::JournalError;
pub use store::JournalStore;
pub use summarizer::{CycleOutcome, CyclePhase, CyclePlan, CycleReport, Summarizer};
pub use weekly::{weekly_export, WeeklyReport};
