// ABOUTME: Prompt and result cleanup for best-effort session auto-naming

const MAX_TITLE_CHARS: usize = 48;

pub fn naming_prompt(lines: &[String]) -> String {
    format!(
        "Below is recent output from a terminal running a coding assistant. Reply with a \
         2-4 word title describing the task being worked on. Reply with the title only, \
         no quotes or punctuation.\n\n{}",
        lines.join("\n")
    )
}

/// First non-empty line, stripped of quotes and markdown; None if nothing usable remains
pub fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let title = line
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '#' | '.' | ':') || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return None;
    }
    Some(title)
}
