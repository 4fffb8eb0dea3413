// ABOUTME: Shared harness for coordinator tests: a fake process spawner and /bin/sh summarizer configs
// Tests drive session output and exit directly instead of running real tools

#![allow(dead_code)]

use manifold::app::{App, AppHandle};
use manifold::config::AppConfig;
use manifold::conversation::{ConversationLocator, ProjectsLocator};
use manifold::session::{
    HostEvent, LaunchRequest, ProcessEvents, ProcessSpawner, SessionError, SessionProcess,
};
use manifold::tools::ToolKind;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Default)]
pub struct ProcessLog {
    pub writes: Vec<Vec<u8>>,
    pub killed: bool,
}

struct FakeProcess(Arc<Mutex<ProcessLog>>);

impl SessionProcess for FakeProcess {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.0.lock().unwrap().writes.push(data.to_vec());
        Ok(())
    }

    fn resize(&mut self, _cols: u16, _rows: u16) -> Result<(), SessionError> {
        Ok(())
    }

    fn kill(&mut self) {
        self.0.lock().unwrap().killed = true;
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}

pub struct Launched {
    pub request: LaunchRequest,
    pub events: ProcessEvents,
    pub log: Arc<Mutex<ProcessLog>>,
}

#[derive(Default)]
pub struct FakeSpawner {
    launched: Mutex<Vec<Launched>>,
}

impl FakeSpawner {
    pub fn events(&self, id: Uuid) -> ProcessEvents {
        self.find(id, |l| l.events.clone())
    }

    pub fn log(&self, id: Uuid) -> Arc<Mutex<ProcessLog>> {
        self.find(id, |l| Arc::clone(&l.log))
    }

    pub fn request(&self, id: Uuid) -> LaunchRequest {
        self.find(id, |l| l.request.clone())
    }

    fn find<T>(&self, id: Uuid, f: impl Fn(&Launched) -> T) -> T {
        let launched = self.launched.lock().unwrap();
        let entry = launched
            .iter()
            .find(|l| l.events.session_id() == id)
            .expect("session was never spawned");
        f(entry)
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(
        &self,
        request: &LaunchRequest,
        events: ProcessEvents,
    ) -> Result<Box<dyn SessionProcess>, SessionError> {
        let log = Arc::new(Mutex::new(ProcessLog::default()));
        self.launched.lock().unwrap().push(Launched {
            request: request.clone(),
            events,
            log: Arc::clone(&log),
        });
        Ok(Box::new(FakeProcess(log)))
    }
}

/// Config whose summarizer is `/bin/sh -c <script>` and whose timers stay out of the way
pub fn test_config(journal_dir: &Path, script: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.journal_dir = journal_dir.to_path_buf();
    config.tool = ToolKind::Claude;
    config.command_override = None;
    config.summarizer_command = Some(vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        script.to_string(),
    ]);
    config.claude_projects_dir = None;
    config.summarize_interval_secs = 3600;
    config.heuristics.auto_name_delay_secs = 3600;
    config.heuristics.invocation_timeout_secs = 10;
    config
}

pub struct Harness {
    pub handle: AppHandle,
    pub spawner: Arc<FakeSpawner>,
    pub events: broadcast::Receiver<HostEvent>,
    pub coordinator: JoinHandle<()>,
}

pub fn start(config: AppConfig) -> Harness {
    let locator = ProjectsLocator::new(config.claude_projects_dir.clone());
    start_with_locator(config, Arc::new(locator))
}

pub fn start_with_locator(config: AppConfig, locator: Arc<dyn ConversationLocator>) -> Harness {
    let spawner = Arc::new(FakeSpawner::default());
    let (app, handle) = App::with_parts(config, Arc::clone(&spawner) as Arc<dyn ProcessSpawner>, locator);
    let events = handle.subscribe();
    let coordinator = app.spawn();
    Harness {
        handle,
        spawner,
        events,
        coordinator,
    }
}

impl Harness {
    /// Emit output from a session and wait until the coordinator has captured it
    pub async fn emit(&mut self, id: Uuid, text: &str) {
        assert!(self.spawner.events(id).output(text.as_bytes().to_vec()));
        self.wait_for(|e| matches!(e, HostEvent::Output { id: from, .. } if *from == id))
            .await;
    }

    pub async fn wait_for(&mut self, pred: impl Fn(&HostEvent) -> bool) -> HostEvent {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match self.events.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("host events closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for host event")
    }
}

pub fn today() -> String {
    chrono::Local::now().date_naive().to_string()
}
