// ABOUTME: Capability table for the supported AI coding-assistant CLIs
// Describes how to launch, resume, and prompt each tool and whether its conversations can be tracked

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a tool resumes an existing conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSyntax {
    /// Trailing flag on the normal launch command: `claude ... --resume <id>`
    Flag(&'static str),
    /// A separate top-level command: `codex resume <id> ...`
    Subcommand(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct ToolCapability {
    pub key: &'static str,
    pub display_name: &'static str,
    pub binary: &'static str,
    pub auto_approve_flag: &'static str,
    pub resume: ResumeSyntax,
    /// Arguments that put the tool in non-interactive mode reading the prompt from stdin
    pub prompt_args: Option<&'static [&'static str]>,
    /// Whether the tool writes a per-project conversation record we can detect
    pub tracks_conversations: bool,
}

const CLAUDE: ToolCapability = ToolCapability {
    key: "claude",
    display_name: "Claude Code",
    binary: "claude",
    auto_approve_flag: "--dangerously-skip-permissions",
    resume: ResumeSyntax::Flag("--resume"),
    prompt_args: Some(&["-p"]),
    tracks_conversations: true,
};

const CODEX: ToolCapability = ToolCapability {
    key: "codex",
    display_name: "Codex CLI",
    binary: "codex",
    auto_approve_flag: "--dangerously-bypass-approvals-and-sandbox",
    resume: ResumeSyntax::Subcommand("resume"),
    prompt_args: Some(&["exec", "-"]),
    tracks_conversations: false,
};

const GEMINI: ToolCapability = ToolCapability {
    key: "gemini",
    display_name: "Gemini CLI",
    binary: "gemini",
    auto_approve_flag: "--yolo",
    resume: ResumeSyntax::Flag("--resume"),
    prompt_args: None,
    tracks_conversations: false,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Claude,
    Codex,
    Gemini,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::Claude, ToolKind::Codex, ToolKind::Gemini];

    pub fn capability(self) -> &'static ToolCapability {
        match self {
            ToolKind::Claude => &CLAUDE,
            ToolKind::Codex => &CODEX,
            ToolKind::Gemini => &GEMINI,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.capability().key.eq_ignore_ascii_case(key.trim()))
    }

    pub fn key(self) -> &'static str {
        self.capability().key
    }

    pub fn supports_prompt_mode(self) -> bool {
        self.capability().prompt_args.is_some()
    }

    pub fn tracks_conversations(self) -> bool {
        self.capability().tracks_conversations
    }

    /// Base launch command: binary plus auto-approval flag, or the configured override
    pub fn base_command(self, command_override: Option<&str>) -> String {
        match command_override {
            Some(cmd) if !cmd.trim().is_empty() => cmd.trim().to_string(),
            _ => {
                let cap = self.capability();
                format!("{} {}", cap.binary, cap.auto_approve_flag)
            }
        }
    }

    /// Full command line to run inside the session shell, resuming `conversation_id` when given
    pub fn launch_command(self, conversation_id: Option<&str>, command_override: Option<&str>) -> String {
        let base = self.base_command(command_override);
        let Some(id) = conversation_id else {
            return base;
        };

        let cap = self.capability();
        match cap.resume {
            ResumeSyntax::Flag(flag) => format!("{} {} {}", base, flag, shell_quote(id)),
            ResumeSyntax::Subcommand(sub) => format!(
                "{} {} {} {}",
                cap.binary,
                sub,
                shell_quote(id),
                cap.auto_approve_flag
            ),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capability().display_name)
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|k| k.key()).collect();
            format!("unknown tool '{}', expected one of: {}", s, known.join(", "))
        })
    }
}

/// Quote a value for POSIX `sh`, so paths and ids survive word splitting untouched
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
