// ABOUTME: One summarization cycle: prompt composition, tool invocation, and day-file commit
// The coordinator collects and clears buffers; this module owns everything in between

use super::buffer::{CollectedSection, Collection, Snapshot};
use super::JournalStore;
use crate::tools::PromptInvoker;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

const SECTION_SEPARATOR: &str = "\n\n---\n\n";
const IDLE_RESULT: &str = "- Idle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Collecting,
    Invoking,
    Committing,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Collecting => "collecting",
            CyclePhase::Invoking => "invoking",
            CyclePhase::Committing => "committing",
        };
        f.write_str(name)
    }
}

/// Everything a cycle needs once collection is done
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub started_at: DateTime<Local>,
    pub groups: Vec<String>,
    pub prompt: String,
    pub snapshot: Snapshot,
}

impl CyclePlan {
    /// None when nothing was captured; such a cycle has no side effects
    pub fn from_collection(collection: Collection, started_at: DateTime<Local>) -> Option<Self> {
        if collection.is_empty() {
            return None;
        }
        Some(Self {
            started_at,
            groups: collection.groups(),
            prompt: compose_prompt(&collection.sections),
            snapshot: collection.snapshot,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Tool summary appended
    Summarized(PathBuf),
    /// Tool reported nothing worth writing
    Idle,
    /// Summary unavailable, fallback entry appended
    Fallback(PathBuf),
    /// Day-file write failed; content is dropped
    PersistFailed,
}

/// Returned to the coordinator, which clears the buffers by `snapshot` whatever the outcome
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub snapshot: Snapshot,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone)]
pub struct Summarizer {
    invoker: PromptInvoker,
    store: JournalStore,
}

impl Summarizer {
    pub fn new(invoker: PromptInvoker, store: JournalStore) -> Self {
        Self { invoker, store }
    }

    pub fn store(&self) -> &JournalStore {
        &self.store
    }

    pub fn invoker(&self) -> &PromptInvoker {
        &self.invoker
    }

    /// Invoking and Committing phases of one cycle
    pub async fn run(&self, plan: CyclePlan) -> CycleReport {
        let CyclePlan {
            started_at,
            groups,
            prompt,
            snapshot,
        } = plan;

        debug!(
            "Summarizing {} project(s), {} byte prompt",
            groups.len(),
            prompt.len()
        );

        let summary = if self.invoker.is_supported() {
            match self.invoker.invoke(&prompt).await {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Journal summary failed, writing fallback entry: {}", e);
                    None
                }
            }
        } else {
            info!(
                "{} has no prompt mode, writing fallback journal entry",
                self.invoker.tool()
            );
            None
        };

        let outcome = match summary {
            Some(text) => {
                let text = text.trim();
                if text.is_empty() || text == IDLE_RESULT {
                    debug!("Summary reported no meaningful activity");
                    CycleOutcome::Idle
                } else {
                    self.commit(started_at, text, CycleOutcome::Summarized)
                }
            }
            None => self.commit(started_at, &fallback_entry(&groups), CycleOutcome::Fallback),
        };

        CycleReport { snapshot, outcome }
    }

    fn commit(
        &self,
        at: DateTime<Local>,
        body: &str,
        wrap: fn(PathBuf) -> CycleOutcome,
    ) -> CycleOutcome {
        match self.store.append_entry(at, body) {
            Ok(path) => wrap(path),
            Err(e) => {
                error!("Failed to write journal entry: {}", e);
                CycleOutcome::PersistFailed
            }
        }
    }
}

/// Sections as the tool sees them: `## Project:` headings, `[name]` blocks, `---` between projects
pub fn format_sections(sections: &[CollectedSection]) -> String {
    sections
        .iter()
        .map(|section| {
            let terminals = section
                .terminals
                .iter()
                .map(|t| format!("[{}]\n{}", t.display_name, t.lines.join("\n")))
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("## Project: {}\n\n{}", section.group, terminals)
        })
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

pub fn compose_prompt(sections: &[CollectedSection]) -> String {
    let grouping = if sections.len() > 1 {
        "- Several projects are present: put each project's bullets under a line reading \
         **<project>**, using the name from its \"Project:\" heading exactly"
    } else {
        "- Start with a line reading **<project>**, using the name from the \"Project:\" \
         heading exactly, then the bullets"
    };

    format!(
        "You keep a concise developer journal. Below is terminal activity captured from \
         coding sessions over the last few minutes. Summarize what was worked on.\n\n\
         Rules:\n\
         - 2-5 bullet points per project, each starting with \"- \"\n\
         - Describe what was accomplished or attempted, not the raw commands\n\
         - Mention file names and features when they are visible\n\
         {}\n\
         - Leave out any project with no meaningful activity (idle prompts, directory navigation)\n\
         - If nothing meaningful happened at all, reply with exactly \"{}\"\n\
         - No other headings, timestamps, or formatting\n\n\
         Terminal activity:\n\n{}",
        grouping,
        IDLE_RESULT,
        format_sections(sections)
    )
}

/// One line per project noting activity without a summary
pub fn fallback_entry(groups: &[String]) -> String {
    groups
        .iter()
        .map(|g| format!("**{}**\n- Active (auto-summary unavailable)", g))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::buffer::CollectedTerminal;
    use crate::journal::JournalBuffers;
    use crate::tools::ToolKind;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn section(group: &str, terminals: &[(&str, &[&str])]) -> CollectedSection {
        CollectedSection {
            group: group.to_string(),
            terminals: terminals
                .iter()
                .map(|(name, lines)| CollectedTerminal {
                    display_name: name.to_string(),
                    lines: lines.iter().map(|l| l.to_string()).collect(),
                })
                .collect(),
        }
    }

    fn summarizer(temp: &TempDir, script: &str, timeout: Duration) -> Summarizer {
        let argv = vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()];
        Summarizer::new(
            PromptInvoker::new(ToolKind::Claude, Some(&argv), timeout),
            JournalStore::new(temp.path()),
        )
    }

    fn plan_for(lines: &str) -> CyclePlan {
        let mut buffers = JournalBuffers::new(400);
        buffers.feed(Uuid::new_v4(), "shell", "api", lines);
        let at = Local.with_ymd_and_hms(2026, 10, 16, 14, 0, 0).unwrap();
        CyclePlan::from_collection(buffers.collect(200), at).unwrap()
    }

    #[test]
    fn sections_are_delimited_by_project() {
        let text = format_sections(&[
            section("api", &[("t1", &["cargo test"]), ("t2", &["vim main.rs"])]),
            section("web", &[("t3", &["npm run dev"])]),
        ]);
        assert_eq!(
            text,
            "## Project: api\n\n[t1]\ncargo test\n\n[t2]\nvim main.rs\
             \n\n---\n\n## Project: web\n\n[t3]\nnpm run dev"
        );
    }

    #[test]
    fn grouping_rule_depends_on_project_count() {
        let one = compose_prompt(&[section("api", &[("t", &["x"])])]);
        let two = compose_prompt(&[section("api", &[("t", &["x"])]), section("web", &[("u", &["y"])])]);
        assert!(one.contains("Start with a line reading"));
        assert!(two.contains("Several projects are present"));
        assert!(two.ends_with("## Project: web\n\n[u]\ny"));
    }

    #[test]
    fn empty_collection_plans_nothing() {
        let buffers = JournalBuffers::new(400);
        assert!(CyclePlan::from_collection(buffers.collect(200), Local::now()).is_none());
    }

    #[test]
    fn fallback_lists_every_project() {
        assert_eq!(
            fallback_entry(&["api".to_string(), "web".to_string()]),
            "**api**\n- Active (auto-summary unavailable)\n\n**web**\n- Active (auto-summary unavailable)"
        );
    }

    #[tokio::test]
    async fn successful_summary_is_appended() {
        let temp = TempDir::new().unwrap();
        let summarizer = summarizer(
            &temp,
            "cat >/dev/null; printf '**api**\\n- Installed deps\\n'",
            Duration::from_secs(10),
        );

        let report = summarizer.run(plan_for("npm install\ndone\n")).await;
        let CycleOutcome::Summarized(path) = report.outcome else {
            panic!("expected summary, got {:?}", report.outcome);
        };
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("# Friday, October 16, 2026\n\n### 2:00 PM\n\n**api**\n- Installed deps\n"));
    }

    #[tokio::test]
    async fn idle_summary_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let summarizer = summarizer(&temp, "cat >/dev/null; echo '- Idle'", Duration::from_secs(10));

        let report = summarizer.run(plan_for("ls\n")).await;
        assert_eq!(report.outcome, CycleOutcome::Idle);
        assert!(!report.snapshot.is_empty());
        assert!(summarizer.store().list_dates().is_empty());
    }

    #[tokio::test]
    async fn failed_invocation_writes_fallback() {
        let temp = TempDir::new().unwrap();
        let summarizer = summarizer(&temp, "exit 1", Duration::from_secs(10));

        let report = summarizer.run(plan_for("make\n")).await;
        let CycleOutcome::Fallback(path) = report.outcome else {
            panic!("expected fallback, got {:?}", report.outcome);
        };
        assert!(fs::read_to_string(path)
            .unwrap()
            .contains("**api**\n- Active (auto-summary unavailable)"));
    }

    #[tokio::test]
    async fn unsupported_tool_goes_straight_to_fallback() {
        let temp = TempDir::new().unwrap();
        let summarizer = Summarizer::new(
            PromptInvoker::new(ToolKind::Gemini, None, Duration::from_secs(1)),
            JournalStore::new(temp.path()),
        );
        let report = summarizer.run(plan_for("make\n")).await;
        assert!(matches!(report.outcome, CycleOutcome::Fallback(_)));
    }

    #[tokio::test]
    async fn unwritable_root_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let argv = vec!["/bin/sh".to_string(), "-c".to_string(), "echo '- did work'".to_string()];
        let summarizer = Summarizer::new(
            PromptInvoker::new(ToolKind::Claude, Some(&argv), Duration::from_secs(10)),
            JournalStore::new(blocker.join("journal")),
        );

        let report = summarizer.run(plan_for("make\n")).await;
        assert_eq!(report.outcome, CycleOutcome::PersistFailed);
    }
}
