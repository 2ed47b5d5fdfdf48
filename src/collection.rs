// Whole-collection documents: one JSON array per persistence key

use crate::kv::KvStore;
use crate::record::Record;
use eyre::{Context, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Decoded collection plus what is needed to write it back safely
#[derive(Debug)]
pub(crate) struct Snapshot<T> {
    pub records: Vec<T>,
    /// Raw text of a document that could not be read as an array at all
    corrupt: Option<String>,
}

impl<T: Record> Snapshot<T> {
    /// Read the collection. Missing key reads as empty.
    pub async fn load<K: KvStore>(kv: &K) -> Result<Self> {
        let key = T::collection_key();
        let raw = kv
            .get(key)
            .await
            .with_context(|| format!("Failed to read collection {}", key))?;

        Ok(match raw {
            Some(raw) => decode(key, &raw),
            None => Self {
                records: Vec::new(),
                corrupt: None,
            },
        })
    }

    /// Replace the stored collection with `self.records` in one write.
    ///
    /// A corrupt document is copied to `<key>.corrupt` first so it is not
    /// lost when it gets replaced.
    pub async fn commit<K: KvStore>(&mut self, kv: &K) -> Result<()> {
        let key = T::collection_key();

        if let Some(raw) = &self.corrupt {
            let backup_key = format!("{}.corrupt", key);
            kv.set(&backup_key, raw)
                .await
                .with_context(|| format!("Failed to back up corrupt collection {}", key))?;
            warn!(collection = key, backup = %backup_key, "Backed up unreadable collection");
            self.corrupt = None;
        }

        let json = serde_json::to_string(&self.records).context("Failed to serialize collection")?;
        kv.set(key, &json)
            .await
            .with_context(|| format!("Failed to write collection {}", key))?;

        debug!(collection = key, count = self.records.len(), "Wrote collection");
        Ok(())
    }
}

/// Decode a collection document, skipping records that do not parse.
///
/// Records sharing a key collapse to the one with the highest updated_at,
/// kept at the position where the key first appeared.
fn decode<T: Record>(key: &str, raw: &str) -> Snapshot<T> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(e) => {
            warn!(collection = key, error = ?e, "Collection is not a JSON array, reading as empty");
            return Snapshot {
                records: Vec::new(),
                corrupt: Some(raw.to_string()),
            };
        }
    };

    let mut records: Vec<T> = Vec::with_capacity(values.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, value) in values.into_iter().enumerate() {
        let record: T = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    collection = key,
                    index,
                    error = ?e,
                    "Failed to parse record, skipping"
                );
                continue;
            }
        };

        // Keep the record with the latest updated_at
        match positions.get(&record.key()) {
            Some(&pos) => {
                if record.updated_at() > records[pos].updated_at() {
                    records[pos] = record;
                }
            }
            None => {
                positions.insert(record.key(), records.len());
                records.push(record);
            }
        }
    }

    debug!(collection = key, count = records.len(), "Loaded collection");

    Snapshot {
        records,
        corrupt: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::models::Task;

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let kv = MemoryKv::new();
        let snapshot: Snapshot<Task> = Snapshot::load(&kv).await.unwrap();
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let kv = MemoryKv::new();
        kv.set(
            "tasks",
            r#"[
                {"id":"t1","title":"Valid","completed":false,"level":0,"created_at":1,"updated_at":1},
                {"id":"t2","title":42},
                {"id":"t3","title":"Also valid","created_at":2,"updated_at":2}
            ]"#,
        )
        .await
        .unwrap();

        let snapshot: Snapshot<Task> = Snapshot::load(&kv).await.unwrap();
        let ids: Vec<&str> = snapshot.records.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t3"]);
    }

    #[tokio::test]
    async fn test_duplicate_keys_keep_latest() {
        let kv = MemoryKv::new();
        kv.set(
            "tasks",
            r#"[
                {"id":"t1","title":"Version 1","created_at":1,"updated_at":1000},
                {"id":"t2","title":"Other","created_at":1,"updated_at":1000},
                {"id":"t1","title":"Version 2","created_at":1,"updated_at":2000},
                {"id":"t1","title":"Stale","created_at":1,"updated_at":1500}
            ]"#,
        )
        .await
        .unwrap();

        let snapshot: Snapshot<Task> = Snapshot::load(&kv).await.unwrap();
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.records[0].id, "t1");
        assert_eq!(snapshot.records[0].title, "Version 2");
        assert_eq!(snapshot.records[1].id, "t2");
    }

    #[tokio::test]
    async fn test_corrupt_document_is_backed_up_on_commit() {
        let kv = MemoryKv::new();
        kv.set("tasks", "{not json").await.unwrap();

        let mut snapshot: Snapshot<Task> = Snapshot::load(&kv).await.unwrap();
        assert!(snapshot.records.is_empty());

        snapshot.records.push(Task::new("Fresh start", None, 0));
        snapshot.commit(&kv).await.unwrap();

        assert_eq!(kv.get("tasks.corrupt").await.unwrap().as_deref(), Some("{not json"));
        let reloaded: Snapshot<Task> = Snapshot::load(&kv).await.unwrap();
        assert_eq!(reloaded.records.len(), 1);
    }
}
