// ABOUTME: Core data models for manifold sessions

pub mod session;

pub use session::{Session, SessionStatus};
