// ABOUTME: Non-interactive tool invocation used by the journal summarizer and session auto-naming
// Pipes the prompt over stdin, captures stdout, and hard-kills the call when it exceeds its timeout

use super::{InvocationError, ToolKind};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Variables that make a nested tool believe it runs inside another tool session
pub const NESTED_SESSION_ENV: [&str; 2] = ["CLAUDECODE", "CLAUDE_CODE_ENTRYPOINT"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl PromptCommand {
    pub fn for_tool(tool: ToolKind) -> Option<Self> {
        let cap = tool.capability();
        cap.prompt_args.map(|args| Self {
            program: cap.binary.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    /// Build from a configured `[program, args...]` list
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

/// Runs the active tool in its piped-prompt mode
#[derive(Debug, Clone)]
pub struct PromptInvoker {
    tool: ToolKind,
    command: Option<PromptCommand>,
    timeout: Duration,
}

impl PromptInvoker {
    pub fn new(tool: ToolKind, command_override: Option<&[String]>, timeout: Duration) -> Self {
        let command = match command_override {
            Some(argv) => PromptCommand::from_argv(argv),
            None => PromptCommand::for_tool(tool),
        };
        Self {
            tool,
            command,
            timeout,
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn is_supported(&self) -> bool {
        self.command.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `prompt` on stdin and return stdout. Non-zero exit, spawn failure, and timeout are errors.
    pub async fn invoke(&self, prompt: &str) -> Result<String, InvocationError> {
        let command = self
            .command
            .as_ref()
            .ok_or(InvocationError::Unsupported(self.tool.capability().display_name))?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for var in NESTED_SESSION_ENV {
            cmd.env_remove(var);
        }

        debug!("Invoking {} with a {} byte prompt", command.program, prompt.len());
        let mut child = cmd.spawn().map_err(|source| InvocationError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        // Feed stdin from its own task so a large prompt cannot deadlock against a full stdout pipe
        if let Some(mut stdin) = child.stdin.take() {
            let payload = prompt.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("Prompt stdin closed early: {}", e);
                }
                let _ = stdin.shutdown().await;
            });
        }

        // Dropping the child on timeout kills it (kill_on_drop)
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("{} did not answer within {:?}, killed", command.program, self.timeout);
                return Err(InvocationError::Timeout(self.timeout));
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(InvocationError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}
