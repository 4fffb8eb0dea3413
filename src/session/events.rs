// ABOUTME: Messages flowing from session processes and timers into the coordinator, and out to the host

use crate::conversation::PollReport;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output(Vec<u8>),
    Exited(Option<u32>),
}

/// Everything a session's background work reports back to the single owner of session state
#[derive(Debug, Clone)]
pub enum SessionSignal {
    Process { id: Uuid, event: ProcessEvent },
    Poll(PollReport),
    /// The readiness delay elapsed; type the withheld initial prompt
    InjectPrompt(Uuid),
    AutoNameDue(Uuid),
}

/// Notifications for the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Output { id: Uuid, data: Vec<u8> },
    Exited { id: Uuid, code: Option<u32> },
    AutoNamed { id: Uuid, name: String },
}

/// Handed to a spawned process so its reader and wait threads can report back
#[derive(Debug, Clone)]
pub struct ProcessEvents {
    id: Uuid,
    tx: mpsc::UnboundedSender<SessionSignal>,
}

impl ProcessEvents {
    pub fn new(id: Uuid, tx: mpsc::UnboundedSender<SessionSignal>) -> Self {
        Self { id, tx }
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    /// False once the coordinator is gone
    pub fn output(&self, data: Vec<u8>) -> bool {
        self.send(ProcessEvent::Output(data))
    }

    pub fn exited(&self, code: Option<u32>) -> bool {
        self.send(ProcessEvent::Exited(code))
    }

    fn send(&self, event: ProcessEvent) -> bool {
        self.tx
            .send(SessionSignal::Process { id: self.id, event })
            .is_ok()
    }
}
