// ABOUTME: Tests for conversation identifier detection against a real project directory
// Records are plain files, written the way claude writes <id>.jsonl into its project folder

mod common;

use common::{start, test_config, Harness};
use manifold::conversation::store::encode_project_dir;
use manifold::session::SessionSpec;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

struct Projects {
    _journal: TempDir,
    root: TempDir,
}

impl Projects {
    fn new() -> Self {
        Self {
            _journal: TempDir::new().unwrap(),
            root: TempDir::new().unwrap(),
        }
    }

    fn dir_for(&self, working_dir: &Path) -> PathBuf {
        let dir = self.root.path().join(encode_project_dir(working_dir));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_record(&self, working_dir: &Path, id: &str) {
        fs::write(self.dir_for(working_dir).join(format!("{}.jsonl", id)), "{}\n").unwrap();
    }

    fn start(&self, interval_ms: u64, attempts: u32) -> Harness {
        let mut config = test_config(self._journal.path(), "cat");
        config.claude_projects_dir = Some(self.root.path().to_path_buf());
        config.heuristics.poll_interval_ms = interval_ms;
        config.heuristics.poll_attempts = attempts;
        start(config)
    }
}

async fn wait_for_id(h: &Harness, id: uuid::Uuid) -> Option<String> {
    for _ in 0..100 {
        let info = h.handle.session_info(id).await.unwrap()?;
        if info.conversation_id.is_some() {
            return info.conversation_id;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

#[tokio::test]
async fn test_poller_resolves_new_record_and_ignores_existing() {
    // BEHAVIOR: the record that appears after spawn is claimed; records that existed are not
    let projects = Projects::new();
    let work = Path::new("/work/api");
    projects.write_record(work, "old-conversation");
    let h = projects.start(30, 50);

    let id = h.handle.create_session(SessionSpec::new(work)).await.unwrap();
    projects.write_record(work, "new-conversation");

    assert_eq!(wait_for_id(&h, id).await, Some("new-conversation".to_string()));
}

#[tokio::test]
async fn test_two_sessions_never_share_an_identifier() {
    // BEHAVIOR: claim-set uniqueness holds for sessions in the same project
    let projects = Projects::new();
    let work = Path::new("/work/shared");
    projects.dir_for(work);
    let h = projects.start(30, 100);

    let first = h.handle.create_session(SessionSpec::new(work)).await.unwrap();
    let second = h.handle.create_session(SessionSpec::new(work)).await.unwrap();

    projects.write_record(work, "conv-a");
    let a = wait_for_id(&h, first).await;
    let b = h.handle.session_info(second).await.unwrap().unwrap().conversation_id;
    let owner_of_a = if a.is_some() { first } else { second };
    let other = if owner_of_a == first { second } else { first };
    assert!(a.is_some() || b.is_some());
    assert_ne!(a, b);

    projects.write_record(work, "conv-b");
    let resolved_other = wait_for_id(&h, other).await.unwrap();
    let resolved_owner = h.handle.conversation_id(owner_of_a).await.unwrap().unwrap();
    assert_ne!(resolved_other, resolved_owner);
}

#[tokio::test]
async fn test_lazy_lookup_resolves_before_poller() {
    // BEHAVIOR: asking for the identifier recomputes immediately instead of waiting for a tick
    let projects = Projects::new();
    let work = Path::new("/work/lazy");
    projects.dir_for(work);
    let h = projects.start(60_000, 30);

    let id = h.handle.create_session(SessionSpec::new(work)).await.unwrap();
    assert_eq!(h.handle.conversation_id(id).await.unwrap(), None);

    projects.write_record(work, "on-demand");
    assert_eq!(
        h.handle.conversation_id(id).await.unwrap(),
        Some("on-demand".to_string())
    );
}

#[tokio::test]
async fn test_exhausted_polling_leaves_identifier_unset() {
    // BEHAVIOR: after the attempt budget, a late record is never attributed to the session
    let projects = Projects::new();
    let work = Path::new("/work/slow");
    projects.dir_for(work);
    let h = projects.start(10, 3);

    let id = h.handle.create_session(SessionSpec::new(work)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    projects.write_record(work, "too-late");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.handle.conversation_id(id).await.unwrap(), None);
}

#[tokio::test]
async fn test_untracked_tools_and_resumes_skip_detection() {
    // BEHAVIOR: codex never resolves; a supplied identifier is used as-is
    let projects = Projects::new();
    let work = Path::new("/work/codex");
    projects.dir_for(work);
    let h = projects.start(20, 20);

    let codex = h
        .handle
        .create_session(SessionSpec::new(work).with_tool(manifold::tools::ToolKind::Codex))
        .await
        .unwrap();
    let resumed = h
        .handle
        .create_session(SessionSpec::new(work).resume("given"))
        .await
        .unwrap();
    projects.write_record(work, "fresh");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(h.handle.conversation_id(codex).await.unwrap(), None);
    assert_eq!(h.handle.conversation_id(resumed).await.unwrap(), Some("given".to_string()));
}
