// Per-date journal entries

use crate::calendar::YearMonth;
use crate::collection::Snapshot;
use crate::error::JournalResult;
use crate::kv::KvStore;
use crate::models::{DayEntry, next_stamp};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key holding the `YYYY-MM` of the last month whose auto-export offer was resolved
pub const WATERMARK_KEY: &str = "auto_export_watermark";

/// Store of one `DayEntry` per calendar date.
///
/// Every write re-serializes the whole collection. Callers are expected to
/// issue writes one at a time; the last full snapshot written wins.
#[derive(Debug)]
pub struct EntryStore<K> {
    kv: Arc<K>,
}

impl<K> Clone for EntryStore<K> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
        }
    }
}

impl<K: KvStore> EntryStore<K> {
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }

    async fn snapshot(&self) -> JournalResult<Snapshot<DayEntry>> {
        Ok(Snapshot::load(&*self.kv).await?)
    }

    /// Entry for an exact date; `None` when missing or unreadable
    pub async fn get_entry(&self, date: NaiveDate) -> JournalResult<Option<DayEntry>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.records.into_iter().find(|e| e.date == date))
    }

    /// Insert or replace the entry for `entry.date`.
    ///
    /// Returns the record as stored, with `updated_at` stamped later than
    /// any earlier write for that date.
    pub async fn save_entry(&self, mut entry: DayEntry) -> JournalResult<DayEntry> {
        let mut snapshot = self.snapshot().await?;

        match snapshot.records.iter().position(|e| e.date == entry.date) {
            Some(pos) => {
                entry.updated_at = next_stamp(snapshot.records[pos].updated_at).max(entry.updated_at);
                snapshot.records[pos] = entry.clone();
                debug!(date = %entry.date, "Replacing entry");
            }
            None => {
                entry.updated_at = next_stamp(i64::MIN).max(entry.updated_at);
                snapshot.records.push(entry.clone());
                debug!(date = %entry.date, "Appending entry");
            }
        }

        snapshot.commit(&*self.kv).await?;

        info!(
            date = %entry.date,
            submitted = entry.is_submitted,
            productive = entry.productive_activities.len(),
            unproductive = entry.unproductive_activities.len(),
            "Saved entry"
        );
        Ok(entry)
    }

    /// All entries, oldest date first
    pub async fn list_entries(&self) -> JournalResult<Vec<DayEntry>> {
        let mut entries = self.snapshot().await?.records;
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    /// Entries whose calendar date falls inside `month`, oldest first
    pub async fn list_entries_for_month(&self, month: YearMonth) -> JournalResult<Vec<DayEntry>> {
        let mut entries: Vec<DayEntry> = self
            .snapshot()
            .await?
            .records
            .into_iter()
            .filter(|e| month.contains(e.date))
            .collect();
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    /// Dates that are submitted and carry a mood answer
    pub async fn list_completed_dates(&self) -> JournalResult<Vec<NaiveDate>> {
        let mut dates: Vec<NaiveDate> = self
            .snapshot()
            .await?
            .records
            .iter()
            .filter(|e| e.is_complete())
            .map(|e| e.date)
            .collect();
        dates.sort();
        Ok(dates)
    }

    // ========================================================================
    // Auto-export watermark
    // ========================================================================

    pub async fn auto_export_watermark(&self) -> JournalResult<Option<YearMonth>> {
        let raw = self.kv.get(WATERMARK_KEY).await?;
        Ok(raw.and_then(|raw| match raw.parse::<YearMonth>() {
            Ok(month) => Some(month),
            Err(e) => {
                warn!(value = %raw, error = %e, "Ignoring unreadable auto-export watermark");
                None
            }
        }))
    }

    pub async fn set_auto_export_watermark(&self, month: YearMonth) -> JournalResult<()> {
        self.kv.set(WATERMARK_KEY, &month.to_string()).await?;
        info!(month = %month, "Advanced auto-export watermark");
        Ok(())
    }

    pub async fn reset_auto_export_watermark(&self) -> JournalResult<()> {
        self.kv.remove(WATERMARK_KEY).await?;
        info!("Reset auto-export watermark");
        Ok(())
    }
}
