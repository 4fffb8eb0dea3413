// ABOUTME: Session registry owning every spawned process and its tracking state
// Mutated only from the coordinator; background work reports back through SessionSignal

use super::activity::{ActivityWindow, ReadinessGate};
use super::events::{ProcessEvents, SessionSignal};
use super::pty::{LaunchRequest, ProcessSpawner, SessionProcess};
use crate::config::Heuristics;
use crate::conversation::{
    spawn_poller, ClaimSet, ConversationLocator, ConversationSnapshot, ConversationStore, PollReport,
};
use crate::journal::buffer::UNKNOWN_GROUP;
use crate::models::{Session, SessionStatus};
use crate::tools::ToolKind;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the host asks for when creating a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSpec {
    pub working_dir: PathBuf,
    /// Defaults to the configured tool
    pub tool: Option<ToolKind>,
    /// Resume this conversation instead of starting a new one
    pub conversation_id: Option<String>,
    pub initial_prompt: Option<String>,
    pub group: Option<String>,
    pub name: Option<String>,
}

impl SessionSpec {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_tool(mut self, tool: ToolKind) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn resume(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.initial_prompt = Some(prompt.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Conversation detection state for one session
struct Tracking {
    store: Arc<dyn ConversationStore>,
    snapshot: ConversationSnapshot,
    poller: Option<JoinHandle<()>>,
    exhausted: bool,
}

impl Tracking {
    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

struct SessionEntry {
    session: Session,
    process: Option<Box<dyn SessionProcess>>,
    tracking: Option<Tracking>,
    activity: ActivityWindow,
    gate: ReadinessGate,
    timers: Vec<JoinHandle<()>>,
}

impl Drop for SessionEntry {
    fn drop(&mut self) {
        if let Some(tracking) = self.tracking.as_mut() {
            tracking.stop_polling();
        }
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

pub struct SessionRegistry {
    spawner: Arc<dyn ProcessSpawner>,
    locator: Arc<dyn ConversationLocator>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    default_tool: ToolKind,
    command_override: Option<String>,
    heuristics: Heuristics,
    entries: HashMap<Uuid, SessionEntry>,
    claims: ClaimSet,
}

impl SessionRegistry {
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        locator: Arc<dyn ConversationLocator>,
        signals: mpsc::UnboundedSender<SessionSignal>,
        default_tool: ToolKind,
        command_override: Option<String>,
        heuristics: Heuristics,
    ) -> Self {
        Self {
            spawner,
            locator,
            signals,
            default_tool,
            command_override,
            heuristics,
            entries: HashMap::new(),
            claims: ClaimSet::new(),
        }
    }

    /// Spawn a session. Never fails: a process that cannot start is reported as an exit.
    pub fn create(&mut self, spec: SessionSpec) -> Uuid {
        let id = Uuid::new_v4();
        let tool = spec.tool.unwrap_or(self.default_tool);
        let group = non_empty(spec.group).unwrap_or_else(|| UNKNOWN_GROUP.to_string());
        let user_name = non_empty(spec.name);
        let name = user_name
            .clone()
            .unwrap_or_else(|| default_name(&spec.working_dir, tool));

        let mut session = Session::new(id, name, group, spec.working_dir.clone(), tool);
        session.named_by_user = user_name.is_some();

        let supplied = non_empty(spec.conversation_id);
        if let Some(conversation_id) = &supplied {
            if self.claims.claim(conversation_id, id) {
                session.conversation_id = Some(conversation_id.clone());
            } else {
                warn!(
                    "Conversation {} is already owned by session {:?}; resuming without claiming it",
                    conversation_id,
                    self.claims.owner(conversation_id)
                );
            }
        }

        // Snapshot before spawning so the record the tool creates is never part of it
        let tracking = if supplied.is_none() && tool.tracks_conversations() {
            self.locator
                .store_for(tool, &spec.working_dir)
                .map(|store| Tracking {
                    snapshot: ConversationSnapshot::capture(store.as_ref(), session.spawned_at),
                    store,
                    poller: None,
                    exhausted: false,
                })
        } else {
            None
        };

        let override_cmd = if tool == self.default_tool {
            self.command_override.as_deref()
        } else {
            None
        };
        let command = tool.launch_command(supplied.as_deref(), override_cmd);
        let request = LaunchRequest::shell_wrapped(
            &spec.working_dir,
            &command,
            self.heuristics.default_cols,
            self.heuristics.default_rows,
        );

        let events = ProcessEvents::new(id, self.signals.clone());
        let process = match self.spawner.spawn(&request, events.clone()) {
            Ok(process) => {
                info!("Created session {} ({}) in {}", id, tool.key(), spec.working_dir.display());
                Some(process)
            }
            Err(e) => {
                warn!("Session {} failed to start: {}", id, e);
                session.set_status(SessionStatus::Exited(None));
                events.exited(None);
                None
            }
        };

        let mut entry = SessionEntry {
            session,
            process,
            tracking,
            activity: ActivityWindow::new(
                self.heuristics.activity_window(),
                self.heuristics.activity_threshold_bytes,
            ),
            gate: ReadinessGate::new(spec.initial_prompt, self.heuristics.prompt_ready_bytes),
            timers: Vec::new(),
        };

        if entry.process.is_some() {
            if let Some(tracking) = entry.tracking.as_mut() {
                let tx = self.signals.clone();
                tracking.poller = Some(spawn_poller(
                    id,
                    Arc::clone(&tracking.store),
                    self.heuristics.poll_interval(),
                    self.heuristics.poll_attempts,
                    move |report| tx.send(SessionSignal::Poll(report)).is_ok(),
                ));
            }
            if !entry.session.named_by_user {
                entry.timers.push(self.schedule(
                    self.heuristics.auto_name_delay(),
                    SessionSignal::AutoNameDue(id),
                ));
            }
        }

        self.entries.insert(id, entry);
        id
    }

    /// Kill the process, cancel its timers and polling, and release its claim. Idempotent.
    pub fn destroy(&mut self, id: Uuid) -> bool {
        let Some(mut entry) = self.entries.remove(&id) else {
            return false;
        };
        if let Some(process) = entry.process.as_mut() {
            process.kill();
        }
        self.claims.release_session(id);
        info!("Destroyed session {}", id);
        true
    }

    pub fn input(&mut self, id: Uuid, data: &[u8]) {
        if let Some(process) = self.live_process(id) {
            if let Err(e) = process.write(data) {
                debug!("Input to session {} dropped: {}", id, e);
            }
        }
    }

    pub fn resize(&mut self, id: Uuid, cols: u16, rows: u16) {
        if let Some(process) = self.live_process(id) {
            if let Err(e) = process.resize(cols, rows) {
                debug!("Resize of session {} failed: {}", id, e);
            }
        }
    }

    pub fn is_active(&mut self, id: Uuid, now: Instant) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => entry.session.is_alive() && entry.activity.is_active(now),
            None => false,
        }
    }

    /// Account for output; returns the session's display name and group for journal capture
    pub fn record_output(&mut self, id: Uuid, bytes: usize, now: Instant) -> Option<(String, String)> {
        let entry = self.entries.get_mut(&id)?;
        entry.activity.record(now, bytes);
        if entry.gate.observe(bytes) {
            debug!("Session {} looks ready, typing initial prompt shortly", id);
            let timer = schedule(&self.signals, self.heuristics.prompt_delay(), SessionSignal::InjectPrompt(id));
            entry.timers.push(timer);
        }
        Some((entry.session.name.clone(), entry.session.group.clone()))
    }

    pub fn inject_prompt(&mut self, id: Uuid) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        if !entry.session.is_alive() {
            return;
        }
        let (Some(prompt), Some(process)) = (entry.gate.take_prompt(), entry.process.as_mut()) else {
            return;
        };
        if let Err(e) = process.write(format!("{}\r", prompt).as_bytes()) {
            warn!("Could not type initial prompt into session {}: {}", id, e);
        }
    }

    pub fn mark_exited(&mut self, id: Uuid, code: Option<u32>) -> bool {
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };
        if entry.session.is_alive() {
            info!("Session {} exited with {:?}", id, code);
        }
        entry.session.set_status(SessionStatus::Exited(code));
        true
    }

    /// Apply one poll tick; resolving claims the identifier and stops polling
    pub fn apply_poll(&mut self, report: PollReport) {
        let id = report.session_id;
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        let Some(tracking) = entry.tracking.as_mut() else {
            return;
        };
        if entry.session.conversation_id.is_some() {
            tracking.stop_polling();
            return;
        }

        match tracking.snapshot.resolve(&report.records, &self.claims) {
            Some(conversation_id) => {
                info!("Session {} resolved conversation {}", id, conversation_id);
                self.claims.claim(&conversation_id, id);
                entry.session.conversation_id = Some(conversation_id);
                tracking.stop_polling();
            }
            None if report.final_attempt => {
                info!(
                    "No conversation record appeared for session {} after {} polls",
                    id, report.attempt
                );
                tracking.exhausted = true;
                tracking.poller = None;
            }
            None => {}
        }
    }

    /// The session's conversation identifier, resolving it now if polling is still pending
    pub fn conversation_id(&mut self, id: Uuid) -> Option<String> {
        let entry = self.entries.get_mut(&id)?;
        if let Some(conversation_id) = &entry.session.conversation_id {
            return Some(conversation_id.clone());
        }
        let tracking = entry.tracking.as_mut()?;
        if tracking.exhausted {
            return None;
        }

        let records = tracking.store.list();
        let conversation_id = tracking.snapshot.resolve(&records, &self.claims)?;
        debug!("Session {} resolved conversation {} on demand", id, conversation_id);
        self.claims.claim(&conversation_id, id);
        entry.session.conversation_id = Some(conversation_id.clone());
        tracking.stop_polling();
        Some(conversation_id)
    }

    pub fn session(&self, id: Uuid) -> Option<&Session> {
        self.entries.get(&id).map(|e| &e.session)
    }

    pub fn rename(&mut self, id: Uuid, name: &str) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.session.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn kill_all(&mut self) {
        for id in self.ids() {
            self.destroy(id);
        }
    }

    fn live_process(&mut self, id: Uuid) -> Option<&mut Box<dyn SessionProcess>> {
        let entry = self.entries.get_mut(&id)?;
        if !entry.session.is_alive() {
            return None;
        }
        entry.process.as_mut()
    }

    fn schedule(&self, delay: std::time::Duration, signal: SessionSignal) -> JoinHandle<()> {
        schedule(&self.signals, delay, signal)
    }
}

fn schedule(
    signals: &mpsc::UnboundedSender<SessionSignal>,
    delay: std::time::Duration,
    signal: SessionSignal,
) -> JoinHandle<()> {
    let tx = signals.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(signal);
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_name(working_dir: &Path, tool: ToolKind) -> String {
    match working_dir.file_name().and_then(|n| n.to_str()) {
        Some(dir) => format!("{} ({})", dir, tool.key()),
        None => tool.key().to_string(),
    }
}
