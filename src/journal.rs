// All stores over one persistence backend

use crate::entries::EntryStore;
use crate::error::JournalResult;
use crate::export::AutoExport;
use crate::kv::KvStore;
use crate::selection::DateSelection;
use crate::session::DaySession;
use crate::tasks::TaskStore;
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Debug)]
pub struct Journal<K> {
    pub entries: EntryStore<K>,
    pub tasks: TaskStore<K>,
    pub selection: DateSelection<K>,
    pub auto_export: AutoExport<K>,
}

impl<K: KvStore> Journal<K> {
    pub fn new(kv: K) -> Self {
        let kv = Arc::new(kv);
        let entries = EntryStore::new(Arc::clone(&kv));
        Self {
            tasks: TaskStore::new(Arc::clone(&kv)),
            selection: DateSelection::new(kv),
            auto_export: AutoExport::new(entries.clone()),
            entries,
        }
    }

    /// Day an entry command works on: `explicit` if given, else the date
    /// picked in the calendar, else `today`. A pick stays in place until it
    /// is replaced or cleared.
    pub async fn entry_date(&self, explicit: Option<NaiveDate>, today: NaiveDate) -> JournalResult<NaiveDate> {
        if let Some(date) = explicit {
            return Ok(date);
        }
        Ok(self.selection.peek().await?.unwrap_or(today))
    }

    /// Open the entry for `date` for editing
    pub async fn open_day(&self, date: NaiveDate) -> JournalResult<DaySession<K>> {
        DaySession::open(self.entries.clone(), date).await
    }
}
