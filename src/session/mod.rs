// ABOUTME: Session management for tool processes running in pseudo-terminals
// Provides the registry, the pty process layer, and the output heuristics sessions depend on

pub mod activity;
pub mod error;
pub mod events;
pub mod naming;
pub mod pty;
pub mod registry;

pub use error::SessionError;
pub use events::{HostEvent, ProcessEvent, ProcessEvents, SessionSignal};
pub use pty::{LaunchRequest, ProcessSpawner, PtySpawner, SessionProcess};
pub use registry::{SessionRegistry, SessionSpec};
