// daybook - Local daily journal and hierarchical task tracker

pub mod calendar;
mod collection;
pub mod config;
pub mod entries;
pub mod error;
pub mod export;
pub mod journal;
pub mod kv;
pub mod models;
pub mod record;
pub mod selection;
pub mod session;
pub mod sqlite;
pub mod tasks;

// Re-export main types for convenience
pub use calendar::YearMonth;
pub use config::{Backend, Config};
pub use entries::EntryStore;
pub use error::{JournalError, JournalResult, ValidationError};
pub use export::{AutoExport, AutoExportCheck, AutoExportOffer, ExportChoice, Resolution, build_month_csv};
pub use journal::Journal;
pub use kv::{AnyKv, FileKv, KvStore, MemoryKv};
pub use models::{DayEntry, Task, TaskPatch, now_ms};
pub use record::Record;
pub use selection::DateSelection;
pub use session::{ActivityKind, DaySession, EntryEdits, EntryState};
pub use sqlite::SqliteKv;
pub use tasks::{TaskIndex, TaskStore};
