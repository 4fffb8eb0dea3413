// ABOUTME: On-demand weekly recap built from the last seven day-files
// Falls back to the raw concatenation when the tool cannot or does not produce a recap

use super::{JournalError, Summarizer};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReport {
    pub markdown: String,
    pub start_date: String,
    pub end_date: String,
}

/// Day-files for `today` and the six days before it, oldest first
pub fn gather_week(summarizer: &Summarizer, today: NaiveDate) -> Vec<(NaiveDate, String)> {
    (0..WINDOW_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .filter_map(|date| summarizer.store().read_day(date).map(|text| (date, text)))
        .collect()
}

pub async fn weekly_export(
    summarizer: &Summarizer,
    today: NaiveDate,
) -> Result<WeeklyReport, JournalError> {
    let days = gather_week(summarizer, today);
    let (Some((first, _)), Some((last, _))) = (days.first(), days.last()) else {
        return Err(JournalError::NoEntries {
            start: (today - Duration::days(WINDOW_DAYS - 1)).to_string(),
            end: today.to_string(),
        });
    };
    let start_date = first.to_string();
    let end_date = last.to_string();

    let raw = days
        .iter()
        .map(|(_, text)| text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    let title = format!("# Weekly Report: {} to {}", start_date, end_date);

    let recap = if summarizer.invoker().is_supported() {
        match summarizer.invoker().invoke(&recap_prompt(&raw)).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => {
                warn!("Weekly recap came back empty, using raw journal");
                None
            }
            Err(e) => {
                warn!("Weekly recap failed, using raw journal: {}", e);
                None
            }
        }
    } else {
        None
    };

    info!("Weekly export covers {} day(s), {} to {}", days.len(), start_date, end_date);
    let body = recap.unwrap_or(raw);
    Ok(WeeklyReport {
        markdown: format!("{}\n\n{}\n", title, body),
        start_date,
        end_date,
    })
}

fn recap_prompt(raw: &str) -> String {
    format!(
        "Below are a week of developer journal entries. Write a weekly recap in markdown \
         with exactly these sections:\n\n\
         ## Overview\n\
         Two or three sentences on the week as a whole.\n\n\
         ## Accomplishments by Project\n\
         A **<project>** line per project followed by its key accomplishments as bullets.\n\n\
         ## Notable Files & Changes\n\
         Bullets naming significant files, features, or changes.\n\n\
         Do not add a title. Journal entries:\n\n{}",
        raw
    )
}
