// ABOUTME: Day-file persistence for the activity journal
// Layout is <root>/YYYY-MM/YYYY-MM-DD.md; files are created with a date header and only ever appended to

use super::JournalError;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct JournalStore {
    root: PathBuf,
}

impl JournalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(format!("{:04}-{:02}", date.year(), date.month()))
            .join(format!("{}.md", date.format(DATE_FORMAT)))
    }

    /// Append one time-stamped entry to the day-file of `at`, creating the file with its
    /// header on the first write of the day
    pub fn append_entry(&self, at: DateTime<Local>, body: &str) -> Result<PathBuf, JournalError> {
        let path = self.day_path(at.date_naive());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(day_header(at.date_naive()).as_bytes())?;
                info!("Started journal day-file {}", path.display());
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let mut file = OpenOptions::new().append(true).open(&path)?;
        file.write_all(format_entry(at, body).as_bytes())?;
        debug!("Appended {} byte entry to {}", body.len(), path.display());
        Ok(path)
    }

    /// Every date with a day-file, newest first
    pub fn list_dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let Ok(months) = fs::read_dir(&self.root) else {
            return dates;
        };

        for month in months.filter_map(|e| e.ok()) {
            if !month.path().is_dir() {
                continue;
            }
            let Ok(days) = fs::read_dir(month.path()) else {
                continue;
            };
            for day in days.filter_map(|e| e.ok()) {
                let path = day.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                if let Some(date) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(parse_date)
                {
                    dates.push(date);
                }
            }
        }

        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        dates
    }

    /// Contents of the day-file for a `YYYY-MM-DD` string; anything else reads nothing
    pub fn read(&self, date: &str) -> Option<String> {
        self.read_day(parse_date(date)?)
    }

    pub fn read_day(&self, date: NaiveDate) -> Option<String> {
        fs::read_to_string(self.day_path(date)).ok()
    }
}

/// Strict `YYYY-MM-DD` parsing; rejects paths and other shapes
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let shaped = value.len() == 10
        && value
            .chars()
            .enumerate()
            .all(|(i, c)| if i == 4 || i == 7 { c == '-' } else { c.is_ascii_digit() });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// `# Friday, October 16, 2026`
pub fn day_header(date: NaiveDate) -> String {
    format!("# {}\n\n", date.format("%A, %B %-d, %Y"))
}

/// `### 3:05 PM`, blank line, body, blank line, rule
pub fn format_entry(at: DateTime<Local>, body: &str) -> String {
    format!(
        "### {}\n\n{}\n\n---\n\n",
        at.format("%-I:%M %p"),
        body.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn day_path_nests_under_month() {
        let store = JournalStore::new("/j");
        let date = NaiveDate::from_ymd_opt(2026, 2, 7).unwrap();
        assert_eq!(store.day_path(date), PathBuf::from("/j/2026-02/2026-02-07.md"));
    }

    #[test]
    fn first_append_writes_header_once() {
        let temp = TempDir::new().unwrap();
        let store = JournalStore::new(temp.path());

        store.append_entry(at(2026, 10, 16, 15, 5), "- first").unwrap();
        let path = store.append_entry(at(2026, 10, 16, 9, 30), "- second\n").unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert_eq!(
            content,
            "# Friday, October 16, 2026\n\n\
             ### 3:05 PM\n\n- first\n\n---\n\n\
             ### 9:30 AM\n\n- second\n\n---\n\n"
        );
    }

    #[test]
    fn lists_dates_newest_first() {
        let temp = TempDir::new().unwrap();
        let store = JournalStore::new(temp.path());
        store.append_entry(at(2026, 9, 30, 10, 0), "x").unwrap();
        store.append_entry(at(2026, 10, 2, 10, 0), "y").unwrap();
        fs::write(temp.path().join("2026-10").join("notes.txt"), "ignored").unwrap();

        let dates: Vec<String> = store.list_dates().iter().map(|d| d.to_string()).collect();
        assert_eq!(dates, vec!["2026-10-02", "2026-09-30"]);
    }

    #[test]
    fn read_rejects_non_date_input() {
        let temp = TempDir::new().unwrap();
        let store = JournalStore::new(temp.path());
        store.append_entry(at(2026, 10, 2, 10, 0), "y").unwrap();

        assert!(store.read("2026-10-02").unwrap().contains("### 10:00 AM\n\ny\n"));
        assert_eq!(store.read("../../etc/passwd"), None);
        assert_eq!(store.read("2026-10-03"), None);
        assert_eq!(store.read("2026-1-02"), None);
    }

    #[test]
    fn empty_root_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let store = JournalStore::new(temp.path().join("missing"));
        assert!(store.list_dates().is_empty());
    }
}
