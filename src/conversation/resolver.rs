// ABOUTME: Infers which conversation record a freshly spawned session created
// Rule: new = current - snapshot - claimed; pick the candidate created closest to the spawn time

use super::{ClaimSet, ConversationRecord, ConversationStore};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Record identifiers that existed when a session was spawned
#[derive(Debug, Clone)]
pub struct ConversationSnapshot {
    known: HashSet<String>,
    spawned_at: DateTime<Utc>,
}

impl ConversationSnapshot {
    pub fn capture(store: &dyn ConversationStore, spawned_at: DateTime<Utc>) -> Self {
        Self::from_records(store.list(), spawned_at)
    }

    pub fn from_records(records: Vec<ConversationRecord>, spawned_at: DateTime<Utc>) -> Self {
        Self {
            known: records.into_iter().map(|r| r.id).collect(),
            spawned_at,
        }
    }

    pub fn spawned_at(&self) -> DateTime<Utc> {
        self.spawned_at
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known.contains(id)
    }

    /// Pick the unclaimed record that appeared after the snapshot and was created nearest
    /// to the spawn time. Two sessions spawned in the same project within one poll window
    /// can still be handed each other's records; this is a heuristic, not a protocol.
    pub fn resolve(&self, current: &[ConversationRecord], claims: &ClaimSet) -> Option<String> {
        current
            .iter()
            .filter(|r| !self.known.contains(&r.id) && !claims.is_claimed(&r.id))
            .min_by_key(|r| {
                let distance = (r.created_at - self.spawned_at).num_milliseconds().abs();
                (distance, r.id.clone())
            })
            .map(|r| r.id.clone())
    }
}

/// One poll tick's view of the store, delivered to the session owner for resolution
#[derive(Debug, Clone)]
pub struct PollReport {
    pub session_id: Uuid,
    pub attempt: u32,
    pub final_attempt: bool,
    pub records: Vec<ConversationRecord>,
}

/// Poll `store` every `interval`, `attempts` times at most. Each tick's listing is handed to
/// `deliver`; the owner aborts the task once it resolves. `deliver` returning false stops polling.
pub fn spawn_poller<F>(
    session_id: Uuid,
    store: Arc<dyn ConversationStore>,
    interval: Duration,
    attempts: u32,
    deliver: F,
) -> JoinHandle<()>
where
    F: Fn(PollReport) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            let listing = {
                let store = Arc::clone(&store);
                tokio::task::spawn_blocking(move || store.list()).await
            };
            let records = match listing {
                Ok(records) => records,
                Err(e) => {
                    debug!("Conversation listing task failed for {}: {}", session_id, e);
                    Vec::new()
                }
            };
            let report = PollReport {
                session_id,
                attempt,
                final_attempt: attempt == attempts,
                records,
            };
            if !deliver(report) {
                break;
            }
        }
        debug!("Conversation poller for {} finished", session_id);
    })
}
