// Month CSV export and the once-per-month auto-export offer

use crate::calendar::YearMonth;
use crate::entries::EntryStore;
use crate::error::{JournalError, JournalResult};
use crate::kv::KvStore;
use crate::models::DayEntry;
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CSV_HEADERS: [&str; 5] = [
    "Date",
    "What did I do Productive",
    "What did I do Unproductive",
    "Do you feel good about your day?",
    "Why",
];

const ACTIVITY_SEPARATOR: &str = "; ";

/// Quote a field, doubling any quotes inside it
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Last day of `month` that gets a row: the month's end, today for the
/// current month, nothing for a future month
fn last_day_included(month: YearMonth, today: NaiveDate) -> u32 {
    let current = YearMonth::of(today);
    if month > current {
        0
    } else if month == current {
        today.day()
    } else {
        month.days_in_month()
    }
}

fn entry_fields(entry: &DayEntry) -> [String; 5] {
    let mood = match entry.feel_good_about_day {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "",
    };
    [
        entry.date.to_string(),
        entry.productive_activities.join(ACTIVITY_SEPARATOR),
        entry.unproductive_activities.join(ACTIVITY_SEPARATOR),
        mood.to_string(),
        entry.feel_good_reason.clone(),
    ]
}

/// Render one row per day of `month` up to `today`. Days without an entry
/// only carry their date.
pub fn build_month_csv(entries: &[DayEntry], month: YearMonth, today: NaiveDate) -> String {
    let by_date: HashMap<NaiveDate, &DayEntry> = entries
        .iter()
        .filter(|e| month.contains(e.date))
        .map(|e| (e.date, e))
        .collect();

    let last_day = last_day_included(month, today);
    let mut lines = Vec::with_capacity(last_day as usize + 1);
    lines.push(csv_row(&CSV_HEADERS));

    for date in (1..=last_day).filter_map(|day| month.day(day)) {
        let row = match by_date.get(&date) {
            Some(entry) => csv_row(&entry_fields(entry)),
            None => csv_row(&[date.to_string(), String::new(), String::new(), String::new(), String::new()]),
        };
        lines.push(row);
    }

    lines.join("\n")
}

/// `EN-<MonthName><Year>.csv`
pub fn export_file_name(month: YearMonth) -> String {
    format!("EN-{}{}.csv", month.name(), month.year())
}

/// Write the CSV for `month` into `dir` and return the file path
pub async fn export_month<K: KvStore>(
    store: &EntryStore<K>,
    month: YearMonth,
    today: NaiveDate,
    dir: &Path,
) -> JournalResult<PathBuf> {
    let entries = store.list_entries_for_month(month).await?;
    let csv = build_month_csv(&entries, month, today);

    tokio::fs::create_dir_all(dir).await.map_err(JournalError::Export)?;
    let path = dir.join(export_file_name(month));
    tokio::fs::write(&path, csv).await.map_err(JournalError::Export)?;

    info!(month = %month, path = ?path, entries = entries.len(), "Exported month");
    Ok(path)
}

// ============================================================================
// Auto-export
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportChoice {
    Export,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Exported(PathBuf),
    Declined,
}

/// Outcome of an auto-export check
#[derive(Debug)]
pub enum AutoExportCheck<K> {
    /// The offer for this month was already shown or skipped
    AlreadyResolved,
    /// Previous month had no submitted entries; the watermark moved on silently
    Skipped { month: YearMonth },
    /// Ask the user; the watermark moves on once the offer is resolved
    Offer(AutoExportOffer<K>),
}

/// Pending offer to export the previous month
#[derive(Debug)]
pub struct AutoExportOffer<K> {
    entries: EntryStore<K>,
    month: YearMonth,
    current: YearMonth,
    today: NaiveDate,
    submitted: usize,
}

impl<K: KvStore> AutoExportOffer<K> {
    /// Month the offer is for
    pub fn month(&self) -> YearMonth {
        self.month
    }

    pub fn submitted_entries(&self) -> usize {
        self.submitted
    }

    pub fn prompt(&self) -> String {
        format!(
            "Would you like to export your {} {} data? You have {} submitted entries from that month.",
            self.month.name(),
            self.month.year(),
            self.submitted
        )
    }

    /// Act on the user's choice and advance the watermark.
    ///
    /// The watermark moves even when the export fails, so the offer is not
    /// repeated this month; the failure is still returned.
    pub async fn resolve(self, choice: ExportChoice, dir: &Path) -> JournalResult<Resolution> {
        let outcome = match choice {
            ExportChoice::Export => export_month(&self.entries, self.month, self.today, dir)
                .await
                .map(Resolution::Exported),
            ExportChoice::Decline => Ok(Resolution::Declined),
        };

        if let Err(e) = &outcome {
            warn!(month = %self.month, error = %e, "Auto-export failed");
        }

        self.entries.set_auto_export_watermark(self.current).await?;
        debug!(month = %self.month, ?choice, "Resolved auto-export offer");
        outcome
    }
}

/// At-most-once-per-month offer to export the previous month
#[derive(Debug)]
pub struct AutoExport<K> {
    entries: EntryStore<K>,
}

impl<K: KvStore> AutoExport<K> {
    pub fn new(entries: EntryStore<K>) -> Self {
        Self { entries }
    }

    pub async fn check(&self, now: NaiveDate) -> JournalResult<AutoExportCheck<K>> {
        let current = YearMonth::of(now);

        if self.entries.auto_export_watermark().await? == Some(current) {
            debug!(month = %current, "Auto-export already resolved this month");
            return Ok(AutoExportCheck::AlreadyResolved);
        }

        let previous = current.previous();
        let submitted = self
            .entries
            .list_entries_for_month(previous)
            .await?
            .iter()
            .filter(|e| e.is_submitted)
            .count();

        if submitted == 0 {
            info!(month = %previous, "No submitted entries, skipping auto-export");
            self.entries.set_auto_export_watermark(current).await?;
            return Ok(AutoExportCheck::Skipped { month: previous });
        }

        Ok(AutoExportCheck::Offer(AutoExportOffer {
            entries: self.entries.clone(),
            month: previous,
            current,
            today: now,
            submitted,
        }))
    }

    /// Forget the watermark so the next check runs again
    pub async fn reset(&self) -> JournalResult<()> {
        self.entries.reset_auto_export_watermark().await
    }
}
