// ABOUTME: Read access to a tool's per-project conversation records
// Claude writes one `<id>.jsonl` per conversation under ~/.claude/projects/<encoded cwd>/

use crate::tools::ToolKind;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A location the resolver can list conversation records from
#[cfg_attr(test, mockall::automock)]
pub trait ConversationStore: Send + Sync {
    /// All records currently present. An unreadable or missing location is an empty list.
    fn list(&self) -> Vec<ConversationRecord>;
}

#[derive(Debug, Clone)]
pub struct ProjectDirStore {
    dir: PathBuf,
    extension: &'static str,
}

impl ProjectDirStore {
    pub fn new(dir: PathBuf, extension: &'static str) -> Self {
        Self { dir, extension }
    }

    /// Store for claude conversations started in `working_dir`
    pub fn claude(projects_root: &Path, working_dir: &Path) -> Self {
        Self::new(projects_root.join(encode_project_dir(working_dir)), "jsonl")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ConversationStore for ProjectDirStore {
    fn list(&self) -> Vec<ConversationRecord> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Conversation dir {} not readable: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(self.extension) {
                    return None;
                }
                let id = path.file_stem()?.to_str()?.to_string();
                let metadata = entry.metadata().ok()?;
                // Birth time where the filesystem records it, otherwise last modification
                let created = metadata.created().or_else(|_| metadata.modified()).ok()?;
                Some(ConversationRecord {
                    id,
                    created_at: DateTime::<Utc>::from(created),
                })
            })
            .collect()
    }
}

/// Finds the record store a tool uses for a working directory
pub trait ConversationLocator: Send + Sync {
    fn store_for(&self, tool: ToolKind, working_dir: &Path) -> Option<Arc<dyn ConversationStore>>;
}

/// Locates claude's per-project directories under a projects root
#[derive(Debug, Clone)]
pub struct ProjectsLocator {
    claude_root: Option<PathBuf>,
}

impl ProjectsLocator {
    pub fn new(claude_root: Option<PathBuf>) -> Self {
        Self { claude_root }
    }
}

impl ConversationLocator for ProjectsLocator {
    fn store_for(&self, tool: ToolKind, working_dir: &Path) -> Option<Arc<dyn ConversationStore>> {
        match tool {
            ToolKind::Claude => {
                let root = self.claude_root.as_deref()?;
                Some(Arc::new(ProjectDirStore::claude(root, working_dir)))
            }
            ToolKind::Codex | ToolKind::Gemini => None,
        }
    }
}

/// Claude names a project directory after the absolute working directory with every
/// non-alphanumeric character replaced by `-`
pub fn encode_project_dir(working_dir: &Path) -> String {
    working_dir
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
