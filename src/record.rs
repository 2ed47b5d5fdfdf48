// Record trait for anything stored as a full-collection document

use serde::{Deserialize, Serialize};

/// Core trait that any stored record must implement
pub trait Record: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    /// Identity within the collection. Two records with the same key are
    /// versions of one record.
    fn key(&self) -> String;

    /// Timestamp when this record was last written (milliseconds since epoch)
    fn updated_at(&self) -> i64;

    /// Persistence key the whole collection is stored under
    fn collection_key() -> &'static str
    where
        Self: Sized;
}
