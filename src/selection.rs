// Hand-off of a chosen date between screens

use crate::error::JournalResult;
use crate::kv::KvStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SELECTED_DATE_KEY: &str = "selected_date";

/// A single persisted date slot: set when a date is picked, read by the
/// entry side until it is replaced, cleared or taken.
#[derive(Debug)]
pub struct DateSelection<K> {
    kv: Arc<K>,
}

impl<K: KvStore> DateSelection<K> {
    pub fn new(kv: Arc<K>) -> Self {
        Self { kv }
    }

    pub async fn set(&self, date: NaiveDate) -> JournalResult<()> {
        self.kv.set(SELECTED_DATE_KEY, &date.to_string()).await?;
        debug!(date = %date, "Selected date");
        Ok(())
    }

    /// Read without consuming
    pub async fn peek(&self) -> JournalResult<Option<NaiveDate>> {
        let raw = self.kv.get(SELECTED_DATE_KEY).await?;
        Ok(raw.and_then(|raw| match raw.trim().parse::<NaiveDate>() {
            Ok(date) => Some(date),
            Err(e) => {
                warn!(value = %raw, error = %e, "Ignoring unreadable selected date");
                None
            }
        }))
    }

    /// Read and clear
    pub async fn take(&self) -> JournalResult<Option<NaiveDate>> {
        let date = self.peek().await?;
        self.clear().await?;
        Ok(date)
    }

    pub async fn clear(&self) -> JournalResult<()> {
        self.kv.remove(SELECTED_DATE_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[tokio::test]
    async fn test_take_consumes_selection() {
        let kv = Arc::new(MemoryKv::new());
        let selection = DateSelection::new(Arc::clone(&kv));
        let d = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        selection.set(d).await.unwrap();
        assert_eq!(kv.get(SELECTED_DATE_KEY).await.unwrap().as_deref(), Some("2025-03-14"));
        assert_eq!(selection.peek().await.unwrap(), Some(d));
        assert_eq!(selection.take().await.unwrap(), Some(d));
        assert_eq!(selection.take().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_selection_is_none() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(SELECTED_DATE_KEY, "yesterday").await.unwrap();
        let selection = DateSelection::new(kv);
        assert_eq!(selection.peek().await.unwrap(), None);
    }
}
