// ABOUTME: Application configuration loaded from ~/.manifold/config.toml
// Holds the journal location, the active tool, and the named heuristics that drive sessions and summaries

use crate::tools::ToolKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that replaces the interactive launch command of the active tool
pub const COMMAND_OVERRIDE_ENV: &str = "MANIFOLD_CMD";

/// Environment variable pointing at an alternate config file
pub const CONFIG_PATH_ENV: &str = "MANIFOLD_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the day-file tree (`<journal_dir>/YYYY-MM/YYYY-MM-DD.md`)
    pub journal_dir: PathBuf,
    /// Tool used for new sessions and for summarization
    pub tool: ToolKind,
    /// Replaces `<binary> <auto-approve flag>` when launching interactive sessions
    pub command_override: Option<String>,
    /// Replaces the tool's non-interactive prompt command (program followed by args)
    pub summarizer_command: Option<Vec<String>>,
    /// Where claude keeps per-project conversation records
    pub claude_projects_dir: Option<PathBuf>,
    pub summarize_interval_secs: u64,
    pub heuristics: Heuristics,
}

/// Thresholds and timings that the session and journal heuristics depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    pub buffer_max_lines: usize,
    pub collect_max_lines: usize,
    pub invocation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    /// Output volume a session must produce before its initial prompt is typed
    pub prompt_ready_bytes: usize,
    pub prompt_delay_ms: u64,
    pub activity_window_ms: u64,
    /// Bytes within the activity window above which a session counts as working
    pub activity_threshold_bytes: usize,
    pub auto_name_delay_secs: u64,
    pub auto_name_lines: usize,
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            buffer_max_lines: 400,
            collect_max_lines: 200,
            invocation_timeout_secs: 60,
            poll_interval_ms: 1000,
            poll_attempts: 30,
            prompt_ready_bytes: 100,
            prompt_delay_ms: 500,
            activity_window_ms: 2500,
            activity_threshold_bytes: 256,
            auto_name_delay_secs: 45,
            auto_name_lines: 100,
            default_cols: 120,
            default_rows: 30,
        }
    }
}

impl Heuristics {
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(self.invocation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn prompt_delay(&self) -> Duration {
        Duration::from_millis(self.prompt_delay_ms)
    }

    pub fn activity_window(&self) -> Duration {
        Duration::from_millis(self.activity_window_ms)
    }

    pub fn auto_name_delay(&self) -> Duration {
        Duration::from_secs(self.auto_name_delay_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            journal_dir: home.join("Documents").join("journal"),
            tool: ToolKind::default(),
            command_override: None,
            summarizer_command: None,
            claude_projects_dir: Some(home.join(".claude").join("projects")),
            summarize_interval_secs: 300,
            heuristics: Heuristics::default(),
        }
    }
}

impl AppConfig {
    /// Load the config file (or defaults when it does not exist) and apply env overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_config_path());
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(cmd) = std::env::var(COMMAND_OVERRIDE_ENV) {
            if !cmd.trim().is_empty() {
                self.command_override = Some(cmd);
            }
        }
    }

    /// Directory holding logs and the config file
    pub fn state_dir() -> PathBuf {
        home_dir().join(".manifold")
    }

    pub fn default_config_path() -> PathBuf {
        Self::state_dir().join("config.toml")
    }

    pub fn summarize_interval(&self) -> Duration {
        Duration::from_secs(self.summarize_interval_secs.max(1))
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.tool, ToolKind::Claude);
        assert_eq!(config.heuristics.buffer_max_lines, 400);
        assert_eq!(config.heuristics.collect_max_lines, 200);
        assert_eq!(config.summarize_interval(), Duration::from_secs(300));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "tool = \"codex\"\njournal_dir = \"/tmp/j\"\n\n[heuristics]\npoll_attempts = 5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.tool, ToolKind::Codex);
        assert_eq!(config.journal_dir, PathBuf::from("/tmp/j"));
        assert_eq!(config.heuristics.poll_attempts, 5);
        assert_eq!(config.heuristics.poll_interval_ms, 1000);
        assert_eq!(config.heuristics.invocation_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "tool = \"notepad\"\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}
