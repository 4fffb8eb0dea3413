// ABOUTME: Per-session capture buffers fed from raw terminal output
// Strips control sequences, keeps non-blank lines, and snapshots/clears by absolute line position

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

lazy_static! {
    static ref CONTROL_SEQUENCES: Regex = Regex::new(concat!(
        r"\x1B\[[0-9;?]*[A-Za-z]", // CSI: cursor movement, colors, modes
        r"|\x1B\][^\x07]*\x07",    // OSC terminated by BEL (window titles)
        r"|\x1B[()][A-Z0-9]",      // charset switches
        r"|[\x00-\x09\x0B-\x1F\x7F]", // remaining control bytes, newline excepted
    ))
    .expect("control sequence pattern is valid");
}

/// Label used when a session has no project/group
pub const UNKNOWN_GROUP: &str = "unknown";

/// Remove terminal control sequences, keeping printable text and newlines
pub fn strip_control(raw: &str) -> String {
    CONTROL_SEQUENCES.replace_all(raw, "").into_owned()
}

#[derive(Debug, Clone)]
pub struct JournalBuffer {
    pub display_name: String,
    pub group: String,
    lines: VecDeque<String>,
    /// Absolute position of `lines[0]` among every line ever pushed
    first_seq: u64,
    order: u64,
}

impl JournalBuffer {
    fn new(display_name: &str, group: &str, order: u64) -> Self {
        let group = if group.trim().is_empty() {
            UNKNOWN_GROUP.to_string()
        } else {
            group.to_string()
        };
        Self {
            display_name: display_name.to_string(),
            group,
            lines: VecDeque::new(),
            first_seq: 0,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }

    /// Absolute position one past the newest line
    pub fn end_seq(&self) -> u64 {
        self.first_seq + self.lines.len() as u64
    }

    fn push(&mut self, line: String, max_lines: usize) {
        self.lines.push_back(line);
        while self.lines.len() > max_lines {
            self.lines.pop_front();
            self.first_seq += 1;
        }
    }

    /// Drop every line before absolute position `end`. Lines already evicted by overflow
    /// count as consumed, so lines arriving after the snapshot always survive.
    fn consume_through(&mut self, end: u64) {
        let count = end.saturating_sub(self.first_seq).min(self.lines.len() as u64);
        self.lines.drain(..count as usize);
        self.first_seq += count;
    }

    /// Consecutive duplicates collapsed, newest `max_lines` kept
    fn collapsed_tail(&self, max_lines: usize) -> Vec<String> {
        let mut collapsed: Vec<String> = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if collapsed.last() != Some(line) {
                collapsed.push(line.clone());
            }
        }
        let skip = collapsed.len().saturating_sub(max_lines);
        collapsed.split_off(skip)
    }
}

/// One session's contribution to a summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedTerminal {
    pub display_name: String,
    pub lines: Vec<String>,
}

/// All contributions sharing a project/group label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedSection {
    pub group: String,
    pub terminals: Vec<CollectedTerminal>,
}

/// End positions recorded at collection time, keyed by session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    ends: HashMap<Uuid, u64>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Uuid> {
        self.ends.keys()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub sections: Vec<CollectedSection>,
    pub snapshot: Snapshot,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn groups(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.group.clone()).collect()
    }
}

#[derive(Debug)]
pub struct JournalBuffers {
    buffers: HashMap<Uuid, JournalBuffer>,
    max_lines: usize,
    next_order: u64,
}

impl JournalBuffers {
    pub fn new(max_lines: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            max_lines: max_lines.max(1),
            next_order: 0,
        }
    }

    /// Append the non-blank lines of `raw`, creating the buffer on first use
    pub fn feed(&mut self, session_id: Uuid, display_name: &str, group: &str, raw: &str) {
        let clean = strip_control(raw);
        let mut lines = clean.split('\n').filter(|l| !l.trim().is_empty()).peekable();
        if lines.peek().is_none() {
            return;
        }

        let order = self.next_order;
        let buffer = self.buffers.entry(session_id).or_insert_with(|| {
            JournalBuffer::new(display_name, group, order)
        });
        if buffer.order == order {
            self.next_order += 1;
        }
        for line in lines {
            buffer.push(line.to_string(), self.max_lines);
        }
    }

    pub fn remove(&mut self, session_id: Uuid) -> Option<JournalBuffer> {
        self.buffers.remove(&session_id)
    }

    pub fn rename(&mut self, session_id: Uuid, display_name: &str) {
        if let Some(buffer) = self.buffers.get_mut(&session_id) {
            buffer.display_name = display_name.to_string();
        }
    }

    pub fn get(&self, session_id: Uuid) -> Option<&JournalBuffer> {
        self.buffers.get(&session_id)
    }

    /// Newest `count` lines of a session, or None when it has captured nothing
    pub fn recent_lines(&self, session_id: Uuid, count: usize) -> Option<Vec<String>> {
        let buffer = self.buffers.get(&session_id).filter(|b| !b.is_empty())?;
        let skip = buffer.len().saturating_sub(count);
        Some(buffer.lines().skip(skip).cloned().collect())
    }

    pub fn has_content(&self) -> bool {
        self.buffers.values().any(|b| !b.is_empty())
    }

    /// Snapshot every non-empty buffer, grouped by label in first-seen order
    pub fn collect(&self, max_lines: usize) -> Collection {
        let mut ordered: Vec<(&Uuid, &JournalBuffer)> =
            self.buffers.iter().filter(|(_, b)| !b.is_empty()).collect();
        ordered.sort_by_key(|(_, b)| b.order);

        let mut collection = Collection::default();
        for (id, buffer) in ordered {
            let terminal = CollectedTerminal {
                display_name: buffer.display_name.clone(),
                lines: buffer.collapsed_tail(max_lines),
            };
            match collection
                .sections
                .iter_mut()
                .find(|s| s.group == buffer.group)
            {
                Some(section) => section.terminals.push(terminal),
                None => collection.sections.push(CollectedSection {
                    group: buffer.group.clone(),
                    terminals: vec![terminal],
                }),
            }
            collection.snapshot.ends.insert(*id, buffer.end_seq());
        }
        collection
    }

    /// Remove exactly what `snapshot` consumed. Buffers destroyed meanwhile are skipped.
    pub fn clear_collected(&mut self, snapshot: &Snapshot) {
        for (id, end) in &snapshot.ends {
            if let Some(buffer) = self.buffers.get_mut(id) {
                buffer.consume_through(*end);
            }
        }
    }
}

/// Reassembles UTF-8 text from byte chunks that may split a multi-byte character
#[derive(Debug, Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending);
        match std::str::from_utf8(&bytes) {
            Ok(text) => text.to_string(),
            Err(e) if e.error_len().is_none() => {
                // Incomplete trailing character: keep it for the next chunk
                let (complete, tail) = bytes.split_at(e.valid_up_to());
                self.pending = tail.to_vec();
                String::from_utf8_lossy(complete).into_owned()
            }
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_escape_sequences_and_control_bytes() {
        let raw = "\x1b[32mgreen\x1b[0m \x1b]0;title\x07text\x1b(B\r\x1b[?25l\tdone\n";
        assert_eq!(strip_control(raw), "green textdone\n");
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        buffers.feed(id, "Session 1", "proj", "one\n\n   \r\ntwo\n");
        let lines: Vec<&String> = buffers.get(id).unwrap().lines().collect();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn control_only_output_creates_no_buffer() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        buffers.feed(id, "s", "p", "\x1b[2J\x1b[H\r\n");
        assert!(buffers.get(id).is_none());
    }

    #[test]
    fn feed_caps_buffer_at_max_lines() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        let raw: String = (0..450).map(|i| format!("line {}\n", i)).collect();
        buffers.feed(id, "s", "p", &raw);

        let buffer = buffers.get(id).unwrap();
        assert_eq!(buffer.len(), 400);
        assert_eq!(buffer.lines().next().unwrap(), "line 50");
    }

    #[test]
    fn collection_collapses_adjacent_duplicates() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        buffers.feed(id, "s", "p", "a\na\na\nb\n");

        let collection = buffers.collect(200);
        assert_eq!(collection.sections[0].terminals[0].lines, vec!["a", "b"]);
        // Collapsing happens at collection time only
        assert_eq!(buffers.get(id).unwrap().len(), 4);
    }

    #[test]
    fn collection_keeps_newest_lines() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        let raw: String = (0..300).map(|i| format!("step {}\n", i)).collect();
        buffers.feed(id, "s", "p", &raw);

        let lines = &buffers.collect(200).sections[0].terminals[0].lines;
        assert_eq!(lines.len(), 200);
        assert_eq!(lines[0], "step 100");
    }

    #[test]
    fn sections_group_by_label_in_first_seen_order() {
        let mut buffers = JournalBuffers::new(400);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        buffers.feed(a, "A", "web", "x\n");
        buffers.feed(b, "B", "", "y\n");
        buffers.feed(c, "C", "web", "z\n");

        let collection = buffers.collect(200);
        assert_eq!(collection.groups(), vec!["web", UNKNOWN_GROUP]);
        assert_eq!(collection.sections[0].terminals.len(), 2);
    }

    #[test]
    fn clearing_keeps_lines_that_arrived_after_snapshot() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        buffers.feed(id, "s", "p", "1\n2\n3\n");
        let snapshot = buffers.collect(200).snapshot;

        buffers.feed(id, "s", "p", "4\n5\n");
        buffers.clear_collected(&snapshot);

        let left: Vec<&String> = buffers.get(id).unwrap().lines().collect();
        assert_eq!(left, vec!["4", "5"]);
    }

    #[test]
    fn clearing_after_overflow_keeps_only_new_lines() {
        let mut buffers = JournalBuffers::new(5);
        let id = Uuid::new_v4();
        buffers.feed(id, "s", "p", "1\n2\n3\n4\n");
        let snapshot = buffers.collect(200).snapshot;

        buffers.feed(id, "s", "p", "5\n6\n7\n");
        buffers.clear_collected(&snapshot);

        let left: Vec<&String> = buffers.get(id).unwrap().lines().collect();
        assert_eq!(left, vec!["5", "6", "7"]);
    }

    #[test]
    fn clearing_skips_removed_buffers() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        buffers.feed(id, "s", "p", "1\n");
        let snapshot = buffers.collect(200).snapshot;
        buffers.remove(id);
        buffers.clear_collected(&snapshot);
        assert!(!buffers.has_content());
    }

    #[test]
    fn recent_lines_returns_tail() {
        let mut buffers = JournalBuffers::new(400);
        let id = Uuid::new_v4();
        buffers.feed(id, "s", "p", "a\nb\nc\n");
        assert_eq!(buffers.recent_lines(id, 2), Some(vec!["b".into(), "c".into()]));
        assert_eq!(buffers.recent_lines(Uuid::new_v4(), 2), None);
    }

    #[test]
    fn utf8_carry_joins_split_characters() {
        let mut carry = Utf8Carry::default();
        let bytes = "héllo".as_bytes();
        let first = carry.decode(&bytes[..2]);
        let second = carry.decode(&bytes[2..]);
        assert_eq!(format!("{}{}", first, second), "héllo");
        assert_eq!(first, "h");
    }
}
