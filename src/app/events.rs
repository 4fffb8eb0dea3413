// ABOUTME: Messages handled by the coordinator: host commands and results of background work

use crate::journal::CycleReport;
use crate::models::Session;
use crate::session::SessionSpec;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Requests from an `AppHandle`; replies travel back on the enclosed oneshot
#[derive(Debug)]
pub enum AppCommand {
    CreateSession {
        spec: SessionSpec,
        reply: oneshot::Sender<Uuid>,
    },
    DestroySession {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    SendInput {
        id: Uuid,
        data: Vec<u8>,
    },
    Resize {
        id: Uuid,
        cols: u16,
        rows: u16,
    },
    IsActive {
        id: Uuid,
        reply: oneshot::Sender<bool>,
    },
    ConversationId {
        id: Uuid,
        reply: oneshot::Sender<Option<String>>,
    },
    SessionInfo {
        id: Uuid,
        reply: oneshot::Sender<Option<Session>>,
    },
    ListSessions {
        reply: oneshot::Sender<Vec<Session>>,
    },
    /// Answered once a cycle that includes everything captured so far has completed
    FlushJournal {
        reply: oneshot::Sender<()>,
    },
    /// Final flush, then every session is killed
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Results of tasks the coordinator spawned
#[derive(Debug)]
pub enum AppEvent {
    CycleFinished(CycleReport),
    AutoNamed { id: Uuid, name: Option<String> },
}
