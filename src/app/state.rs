// ABOUTME: Coordinator state: sessions, journal buffers, and the summarizer cycle
// Every mutation happens here, one message at a time; slow work is spawned and reported back

use super::events::{AppCommand, AppEvent};
use crate::config::Heuristics;
use crate::journal::{CyclePhase, CyclePlan, CycleReport, JournalBuffers, Summarizer, Utf8Carry};
use crate::session::naming::{clean_title, naming_prompt};
use crate::session::{HostEvent, ProcessEvent, SessionRegistry, SessionSignal};
use chrono::Local;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

pub struct AppState {
    pub registry: SessionRegistry,
    pub buffers: JournalBuffers,
    carries: HashMap<Uuid, Utf8Carry>,
    summarizer: Arc<Summarizer>,
    heuristics: Heuristics,
    phase: CyclePhase,
    rerun: bool,
    flush_waiters: Vec<oneshot::Sender<()>>,
    shutting_down: bool,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
    events: mpsc::UnboundedSender<AppEvent>,
    host: broadcast::Sender<HostEvent>,
}

impl AppState {
    pub fn new(
        registry: SessionRegistry,
        summarizer: Arc<Summarizer>,
        heuristics: Heuristics,
        events: mpsc::UnboundedSender<AppEvent>,
        host: broadcast::Sender<HostEvent>,
    ) -> Self {
        Self {
            registry,
            buffers: JournalBuffers::new(heuristics.buffer_max_lines),
            carries: HashMap::new(),
            summarizer,
            heuristics,
            phase: CyclePhase::Idle,
            rerun: false,
            flush_waiters: Vec::new(),
            shutting_down: false,
            shutdown_waiters: Vec::new(),
            events,
            host,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn handle_command(&mut self, command: AppCommand) {
        match command {
            AppCommand::CreateSession { spec, reply } => {
                let id = self.registry.create(spec);
                let _ = reply.send(id);
            }
            AppCommand::DestroySession { id, reply } => {
                let _ = reply.send(self.destroy_session(id));
            }
            AppCommand::SendInput { id, data } => self.registry.input(id, &data),
            AppCommand::Resize { id, cols, rows } => self.registry.resize(id, cols, rows),
            AppCommand::IsActive { id, reply } => {
                let _ = reply.send(self.registry.is_active(id, Instant::now()));
            }
            AppCommand::ConversationId { id, reply } => {
                let _ = reply.send(self.registry.conversation_id(id));
            }
            AppCommand::SessionInfo { id, reply } => {
                let _ = reply.send(self.registry.session(id).cloned());
            }
            AppCommand::ListSessions { reply } => {
                let mut sessions: Vec<_> = self
                    .registry
                    .ids()
                    .into_iter()
                    .filter_map(|id| self.registry.session(id).cloned())
                    .collect();
                sessions.sort_by_key(|s| s.spawned_at);
                let _ = reply.send(sessions);
            }
            AppCommand::FlushJournal { reply } => {
                self.flush_waiters.push(reply);
                self.request_cycle();
            }
            AppCommand::Shutdown { reply } => self.begin_shutdown(Some(reply)),
        }
    }

    pub fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::Process {
                id,
                event: ProcessEvent::Output(data),
            } => self.capture_output(id, data),
            SessionSignal::Process {
                id,
                event: ProcessEvent::Exited(code),
            } => {
                if self.registry.mark_exited(id, code) {
                    let _ = self.host.send(HostEvent::Exited { id, code });
                }
            }
            SessionSignal::Poll(report) => self.registry.apply_poll(report),
            SessionSignal::InjectPrompt(id) => self.registry.inject_prompt(id),
            SessionSignal::AutoNameDue(id) => self.start_auto_name(id),
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::CycleFinished(report) => self.finish_cycle(report),
            AppEvent::AutoNamed { id, name } => self.apply_auto_name(id, name),
        }
    }

    /// Start a cycle, or coalesce into one follow-up when a cycle is already running
    pub fn request_cycle(&mut self) {
        if self.phase != CyclePhase::Idle {
            debug!("Journal cycle in progress ({}), queueing another", self.phase);
            self.rerun = true;
            return;
        }

        self.phase = CyclePhase::Collecting;
        let collection = self.buffers.collect(self.heuristics.collect_max_lines);
        let Some(plan) = CyclePlan::from_collection(collection, Local::now()) else {
            debug!("Nothing captured since the last journal cycle");
            self.phase = CyclePhase::Idle;
            self.answer_flush_waiters();
            return;
        };

        self.phase = CyclePhase::Invoking;
        let summarizer = Arc::clone(&self.summarizer);
        let events = self.events.clone();
        tokio::spawn(async move {
            let report = summarizer.run(plan).await;
            let _ = events.send(AppEvent::CycleFinished(report));
        });
    }

    fn finish_cycle(&mut self, report: CycleReport) {
        self.phase = CyclePhase::Committing;
        self.buffers.clear_collected(&report.snapshot);
        debug!("Journal cycle finished: {:?}", report.outcome);
        self.phase = CyclePhase::Idle;

        if std::mem::take(&mut self.rerun) {
            self.request_cycle();
        } else {
            self.answer_flush_waiters();
        }
    }

    fn answer_flush_waiters(&mut self) {
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    pub fn begin_shutdown(&mut self, reply: Option<oneshot::Sender<()>>) {
        if !self.shutting_down {
            info!("Shutting down: final journal flush");
        }
        self.shutting_down = true;
        self.shutdown_waiters.extend(reply);
        self.request_cycle();
    }

    /// True once the final flush has been written
    pub fn shutdown_ready(&self) -> bool {
        self.shutting_down && self.phase == CyclePhase::Idle && !self.rerun
    }

    pub fn finish_shutdown(&mut self) {
        info!("Killing {} session(s)", self.registry.len());
        self.registry.kill_all();
        self.carries.clear();
        self.answer_flush_waiters();
        for waiter in self.shutdown_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }

    fn destroy_session(&mut self, id: Uuid) -> bool {
        self.buffers.remove(id);
        self.carries.remove(&id);
        self.registry.destroy(id)
    }

    fn capture_output(&mut self, id: Uuid, data: Vec<u8>) {
        let Some((name, group)) = self.registry.record_output(id, data.len(), Instant::now()) else {
            return;
        };
        let text = self.carries.entry(id).or_default().decode(&data);
        self.buffers.feed(id, &name, &group, &text);
        let _ = self.host.send(HostEvent::Output { id, data });
    }

    fn start_auto_name(&mut self, id: Uuid) {
        let invoker = self.summarizer.invoker();
        if !invoker.is_supported() {
            debug!("{} has no prompt mode, not naming session {}", invoker.tool(), id);
            return;
        }
        match self.registry.session(id) {
            Some(session) if !session.named_by_user => {}
            _ => return,
        }
        let Some(lines) = self.buffers.recent_lines(id, self.heuristics.auto_name_lines) else {
            debug!("Session {} has no output to name it from", id);
            return;
        };

        let invoker = invoker.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let name = match invoker.invoke(&naming_prompt(&lines)).await {
                Ok(raw) => clean_title(&raw),
                Err(e) => {
                    debug!("Auto-naming session {} failed: {}", id, e);
                    None
                }
            };
            let _ = events.send(AppEvent::AutoNamed { id, name });
        });
    }

    fn apply_auto_name(&mut self, id: Uuid, name: Option<String>) {
        let Some(name) = name else {
            return;
        };
        if self.registry.rename(id, &name) {
            info!("Session {} named \"{}\"", id, name);
            self.buffers.rename(id, &name);
            let _ = self.host.send(HostEvent::AutoNamed { id, name });
        }
    }
}
