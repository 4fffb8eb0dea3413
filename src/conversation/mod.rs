// ABOUTME: Conversation identity recovery for tools that persist their own conversation records
// Snapshots the record store at spawn, polls for new records, and claims identifiers exclusively

pub mod claims;
pub mod resolver;
pub mod store;

pub use claims::ClaimSet;
pub use resolver::{spawn_poller, ConversationSnapshot, PollReport};
pub use store::{
    ConversationLocator, ConversationRecord, ConversationStore, ProjectDirStore, ProjectsLocator,
};
