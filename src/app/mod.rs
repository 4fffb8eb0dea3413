// ABOUTME: The coordinator owning all session and journal state, and the handle hosts talk to it through
// One task runs the select loop; everything else reaches it over channels

pub mod error;
pub mod events;
pub mod state;

pub use error::AppError;
pub use events::{AppCommand, AppEvent};
pub use state::AppState;

use crate::config::AppConfig;
use crate::conversation::{ConversationLocator, ProjectsLocator};
use crate::journal::{weekly_export, JournalError, JournalStore, Summarizer, WeeklyReport};
use crate::models::Session;
use crate::session::{HostEvent, ProcessSpawner, PtySpawner, SessionRegistry, SessionSignal, SessionSpec};
use crate::tools::PromptInvoker;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

const COMMAND_CAPACITY: usize = 256;
const HOST_EVENT_CAPACITY: usize = 1024;

pub struct App {
    state: AppState,
    commands: mpsc::Receiver<AppCommand>,
    signals: mpsc::UnboundedReceiver<SessionSignal>,
    events: mpsc::UnboundedReceiver<AppEvent>,
    summarize_interval: Duration,
}

impl App {
    /// Coordinator with real pseudo-terminals and claude's project directories
    pub fn new(config: AppConfig) -> (Self, AppHandle) {
        let locator = ProjectsLocator::new(config.claude_projects_dir.clone());
        Self::with_parts(config, Arc::new(PtySpawner), Arc::new(locator))
    }

    pub fn with_parts(
        config: AppConfig,
        spawner: Arc<dyn ProcessSpawner>,
        locator: Arc<dyn ConversationLocator>,
    ) -> (Self, AppHandle) {
        let heuristics = config.heuristics.clone();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (host_tx, _) = broadcast::channel(HOST_EVENT_CAPACITY);

        let summarizer = Arc::new(Summarizer::new(
            PromptInvoker::new(
                config.tool,
                config.summarizer_command.as_deref(),
                heuristics.invocation_timeout(),
            ),
            JournalStore::new(config.journal_dir.clone()),
        ));
        let registry = SessionRegistry::new(
            spawner,
            locator,
            signal_tx,
            config.tool,
            config.command_override.clone(),
            heuristics.clone(),
        );
        let state = AppState::new(
            registry,
            Arc::clone(&summarizer),
            heuristics,
            event_tx,
            host_tx.clone(),
        );

        let app = Self {
            state,
            commands: command_rx,
            signals: signal_rx,
            events: event_rx,
            summarize_interval: config.summarize_interval(),
        };
        let handle = AppHandle {
            commands: command_tx,
            host: host_tx,
            summarizer,
        };
        (app, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Serve commands, session signals, task results, and the summary timer until shutdown
    pub async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.summarize_interval, self.summarize_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;
        info!("Coordinator started, summarizing every {:?}", self.summarize_interval);

        loop {
            tokio::select! {
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.state.handle_command(command),
                    None => {
                        info!("All handles dropped");
                        commands_open = false;
                        self.state.begin_shutdown(None);
                    }
                },
                Some(signal) = self.signals.recv() => self.state.handle_signal(signal),
                Some(event) = self.events.recv() => self.state.handle_event(event),
                _ = ticker.tick(), if !self.state.is_shutting_down() => self.state.request_cycle(),
                else => break,
            }

            if self.state.shutdown_ready() {
                self.state.finish_shutdown();
                break;
            }
        }
        info!("Coordinator stopped");
    }
}

/// Cheap, cloneable access to a running coordinator
#[derive(Clone)]
pub struct AppHandle {
    commands: mpsc::Sender<AppCommand>,
    host: broadcast::Sender<HostEvent>,
    summarizer: Arc<Summarizer>,
}

impl AppHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> AppCommand) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(make(reply)).await?;
        response.await.map_err(|_| AppError::Stopped)
    }

    async fn send(&self, command: AppCommand) -> Result<(), AppError> {
        self.commands.send(command).await.map_err(|_| AppError::Stopped)
    }

    pub async fn create_session(&self, spec: SessionSpec) -> Result<Uuid, AppError> {
        self.request(|reply| AppCommand::CreateSession { spec, reply }).await
    }

    /// False when the session was already gone
    pub async fn destroy_session(&self, id: Uuid) -> Result<bool, AppError> {
        self.request(|reply| AppCommand::DestroySession { id, reply }).await
    }

    pub async fn send_input(&self, id: Uuid, data: impl Into<Vec<u8>>) -> Result<(), AppError> {
        self.send(AppCommand::SendInput {
            id,
            data: data.into(),
        })
        .await
    }

    pub async fn resize(&self, id: Uuid, cols: u16, rows: u16) -> Result<(), AppError> {
        self.send(AppCommand::Resize { id, cols, rows }).await
    }

    pub async fn is_active(&self, id: Uuid) -> Result<bool, AppError> {
        self.request(|reply| AppCommand::IsActive { id, reply }).await
    }

    pub async fn conversation_id(&self, id: Uuid) -> Result<Option<String>, AppError> {
        self.request(|reply| AppCommand::ConversationId { id, reply }).await
    }

    pub async fn session_info(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        self.request(|reply| AppCommand::SessionInfo { id, reply }).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, AppError> {
        self.request(|reply| AppCommand::ListSessions { reply }).await
    }

    /// Every `YYYY-MM-DD` with a day-file, newest first
    pub fn list_journal_dates(&self) -> Vec<String> {
        self.summarizer
            .store()
            .list_dates()
            .iter()
            .map(|d| d.to_string())
            .collect()
    }

    pub fn read_journal(&self, date: &str) -> Option<String> {
        self.summarizer.store().read(date)
    }

    /// Resolves once everything captured before the call has been through a cycle
    pub async fn flush_journal_now(&self) -> Result<(), AppError> {
        self.request(|reply| AppCommand::FlushJournal { reply }).await
    }

    pub async fn weekly_export(&self) -> Result<WeeklyReport, JournalError> {
        weekly_export(&self.summarizer, Local::now().date_naive()).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.host.subscribe()
    }

    /// Final flush, then every session is killed and the coordinator stops
    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.request(|reply| AppCommand::Shutdown { reply }).await
    }
}
