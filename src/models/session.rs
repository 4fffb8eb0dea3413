// ABOUTME: Session data model describing one spawned tool process and its tracking metadata

use crate::tools::ToolKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Running,
    Exited(Option<u32>),
}

impl SessionStatus {
    pub fn indicator(&self) -> &'static str {
        match self {
            SessionStatus::Running => "●",
            SessionStatus::Exited(_) => "✗",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub group: String,
    pub working_dir: PathBuf,
    pub tool: ToolKind,
    pub conversation_id: Option<String>,
    pub spawned_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Set when the caller chose the name; auto-naming leaves such sessions alone
    pub named_by_user: bool,
}

impl Session {
    pub fn new(id: Uuid, name: String, group: String, working_dir: PathBuf, tool: ToolKind) -> Self {
        Self {
            id,
            name,
            group,
            working_dir,
            tool,
            conversation_id: None,
            spawned_at: Utc::now(),
            status: SessionStatus::Running,
            named_by_user: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status.is_running()
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }
}
