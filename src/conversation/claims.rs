// ABOUTME: Process-wide set of conversation identifiers owned by live sessions
// An identifier belongs to at most one session; claims are released when that session is destroyed

use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct ClaimSet {
    owners: HashMap<String, Uuid>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `conversation_id` for `session_id`. Returns false if another session holds it.
    pub fn claim(&mut self, conversation_id: &str, session_id: Uuid) -> bool {
        match self.owners.get(conversation_id) {
            Some(owner) if *owner != session_id => false,
            Some(_) => true,
            None => {
                self.owners.insert(conversation_id.to_string(), session_id);
                true
            }
        }
    }

    pub fn is_claimed(&self, conversation_id: &str) -> bool {
        self.owners.contains_key(conversation_id)
    }

    pub fn owner(&self, conversation_id: &str) -> Option<Uuid> {
        self.owners.get(conversation_id).copied()
    }

    /// Release every identifier held by `session_id`
    pub fn release_session(&mut self, session_id: Uuid) {
        self.owners.retain(|_, owner| *owner != session_id);
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
