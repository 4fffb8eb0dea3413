// ABOUTME: Pseudo-terminal backed session processes
// A reader thread forwards output, a writer thread drains input, and a wait thread reports exit

use super::events::ProcessEvents;
use super::SessionError;
use crate::tools::{invoke::NESTED_SESSION_ENV, shell_quote};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const READ_CHUNK: usize = 4096;

/// Everything needed to start one session process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
    pub env_remove: Vec<String>,
    pub cols: u16,
    pub rows: u16,
    /// The tool command line the shell runs, kept for logging
    pub tool_command: String,
}

impl LaunchRequest {
    /// `<shell> -c "cd '<dir>' && <cmd>; exec <shell>"` so the terminal drops back to a shell
    /// when the tool exits
    pub fn shell_wrapped(working_dir: &Path, tool_command: &str, cols: u16, rows: u16) -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "/bin/sh".to_string());
        let script = format!(
            "cd {} && {}; exec {}",
            shell_quote(&working_dir.to_string_lossy()),
            tool_command,
            shell
        );

        let mut env = vec![("TERM".to_string(), "xterm-256color".to_string())];
        if let Some(home) = dirs::home_dir() {
            env.push(("HOME".to_string(), home.to_string_lossy().into_owned()));
        }

        Self {
            program: shell,
            args: vec!["-c".to_string(), script],
            working_dir: working_dir.to_path_buf(),
            env,
            env_remove: NESTED_SESSION_ENV.iter().map(|v| v.to_string()).collect(),
            cols,
            rows,
            tool_command: tool_command.to_string(),
        }
    }
}

/// A running session process owned by the registry
pub trait SessionProcess: Send {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError>;
    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), SessionError>;
    fn kill(&mut self);
    fn pid(&self) -> Option<u32>;
}

/// Starts session processes. Output and exit are reported through `events`, never returned.
pub trait ProcessSpawner: Send + Sync {
    fn spawn(
        &self,
        request: &LaunchRequest,
        events: ProcessEvents,
    ) -> Result<Box<dyn SessionProcess>, SessionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PtySpawner;

impl ProcessSpawner for PtySpawner {
    fn spawn(
        &self,
        request: &LaunchRequest,
        events: ProcessEvents,
    ) -> Result<Box<dyn SessionProcess>, SessionError> {
        Ok(Box::new(PtyProcess::spawn(request, events)?))
    }
}

pub struct PtyProcess {
    input_tx: mpsc::UnboundedSender<Vec<u8>>,
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
}

impl PtyProcess {
    pub fn spawn(request: &LaunchRequest, events: ProcessEvents) -> Result<Self, SessionError> {
        let pty_system = native_pty_system();
        let portable_pty::PtyPair { master, slave } = pty_system
            .openpty(PtySize {
                rows: request.rows,
                cols: request.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::PtyCreationFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&request.program);
        cmd.args(&request.args);
        cmd.cwd(&request.working_dir);
        for var in &request.env_remove {
            cmd.env_remove(var);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }

        let child = slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::SpawnFailed {
                program: request.program.clone(),
                reason: e.to_string(),
            })?;
        // The master must see EOF once the child exits
        drop(slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        let reader = master
            .try_clone_reader()
            .map_err(|e| SessionError::PtyCreationFailed(e.to_string()))?;
        let writer = master
            .take_writer()
            .map_err(|e| SessionError::PtyCreationFailed(e.to_string()))?;

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        spawn_reader_thread(reader, events.clone());
        spawn_writer_thread(writer, input_rx);
        spawn_wait_thread(child, events);

        debug!(
            "Spawned pty session (pid {:?}) running: {}",
            pid, request.tool_command
        );
        Ok(Self {
            input_tx,
            master,
            killer,
            pid,
        })
    }
}

impl SessionProcess for PtyProcess {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.input_tx
            .send(data.to_vec())
            .map_err(|_| SessionError::InputClosed)
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::ResizeFailed(e.to_string()))
    }

    fn kill(&mut self) {
        if let Err(e) = self.killer.kill() {
            debug!("Kill of pid {:?} failed: {}", self.pid, e);
        }
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        let _ = self.killer.kill();
    }
}

fn spawn_reader_thread(mut reader: Box<dyn Read + Send>, events: ProcessEvents) {
    std::thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if !events.output(buf[..n].to_vec()) {
                        break;
                    }
                }
                Err(e) => {
                    // EIO is how a closed pty reports EOF on Linux
                    debug!("PTY read for {} ended: {}", events.session_id(), e);
                    break;
                }
            }
        }
    });
}

fn spawn_writer_thread(
    mut writer: Box<dyn Write + Send>,
    mut input_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    std::thread::spawn(move || {
        while let Some(data) = input_rx.blocking_recv() {
            if writer.write_all(&data).is_err() {
                break;
            }
            let _ = writer.flush();
        }
    });
}

fn spawn_wait_thread(mut child: Box<dyn portable_pty::Child + Send + Sync>, events: ProcessEvents) {
    std::thread::spawn(move || {
        let code = match child.wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                warn!("Waiting on session {} failed: {}", events.session_id(), e);
                None
            }
        };
        events.exited(code);
    });
}
