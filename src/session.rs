// Draft / Submitted / Editing lifecycle of the entry shown for one date

use crate::entries::EntryStore;
use crate::error::{JournalResult, ValidationError};
use crate::kv::KvStore;
use crate::models::DayEntry;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Not submitted; every change is saved immediately
    Draft,
    /// Finalized; fields are read-only
    Submitted,
    /// Re-opened from Submitted; saved like a draft until finished or cancelled
    Editing,
}

/// One of the two activity lists of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ActivityKind {
    Productive,
    Unproductive,
}

/// Changes made to a submitted entry in one edit-and-resubmit pass.
/// Removal positions count from 1, as listed to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEdits {
    pub add_productive: Vec<String>,
    pub add_unproductive: Vec<String>,
    pub remove_productive: Vec<usize>,
    pub remove_unproductive: Vec<usize>,
    pub feel_good: Option<Option<bool>>,
    pub reason: Option<String>,
}

/// Working copy of the entry for one date.
///
/// Every field edit is written through before the call returns. The record
/// for a date is created by the first edit, not by opening the session.
#[derive(Debug)]
pub struct DaySession<K> {
    store: EntryStore<K>,
    working: DayEntry,
    state: EntryState,
    /// Unsaved in-memory changes (left behind by a failed write)
    dirty: bool,
    /// Submitted record to restore when editing is cancelled
    checkpoint: Option<DayEntry>,
}

impl<K: KvStore> DaySession<K> {
    pub async fn open(store: EntryStore<K>, date: NaiveDate) -> JournalResult<Self> {
        let mut session = Self {
            store,
            working: DayEntry::new(date),
            state: EntryState::Draft,
            dirty: false,
            checkpoint: None,
        };
        session.load(date).await?;
        Ok(session)
    }

    pub fn date(&self) -> NaiveDate {
        self.working.date
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn entry(&self) -> &DayEntry {
        &self.working
    }

    pub fn is_read_only(&self) -> bool {
        self.state == EntryState::Submitted
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether `submit` would currently be accepted
    pub fn can_submit(&self) -> bool {
        self.state != EntryState::Submitted && self.validate_submission().is_ok()
    }

    async fn load(&mut self, date: NaiveDate) -> JournalResult<()> {
        let (working, state) = match self.store.get_entry(date).await? {
            Some(entry) if entry.is_submitted => (entry, EntryState::Submitted),
            Some(entry) => (entry, EntryState::Draft),
            None => (DayEntry::new(date), EntryState::Draft),
        };

        debug!(date = %date, state = ?state, "Loaded day");
        self.working = working;
        self.state = state;
        self.dirty = false;
        self.checkpoint = None;
        Ok(())
    }

    /// Discard in-memory state and read the date back from storage
    pub async fn reload(&mut self) -> JournalResult<()> {
        self.load(self.working.date).await
    }

    /// Write pending changes, if any
    pub async fn flush(&mut self) -> JournalResult<()> {
        if !self.dirty {
            return Ok(());
        }

        let mut record = self.working.clone();
        record.is_submitted = self.state == EntryState::Submitted;
        self.working = self.store.save_entry(record).await?;
        self.dirty = false;
        Ok(())
    }

    /// Flush the current date, then load `date`.
    ///
    /// The flush is awaited before loading, so no write for the old date can
    /// land after this returns.
    pub async fn switch_date(&mut self, date: NaiveDate) -> JournalResult<()> {
        self.flush().await?;
        self.load(date).await
    }

    async fn edit_with<F>(&mut self, f: F) -> JournalResult<()>
    where
        F: FnOnce(&mut DayEntry) -> Result<(), ValidationError>,
    {
        if self.state == EntryState::Submitted {
            return Err(ValidationError::EntryLocked.into());
        }

        let mut next = self.working.clone();
        f(&mut next)?;
        self.working = next;
        self.dirty = true;
        self.flush().await
    }

    pub async fn add_productive(&mut self, text: &str) -> JournalResult<()> {
        let text = activity_text(text)?;
        self.edit_with(|e| {
            e.productive_activities.push(text);
            Ok(())
        })
        .await
    }

    pub async fn add_unproductive(&mut self, text: &str) -> JournalResult<()> {
        let text = activity_text(text)?;
        self.edit_with(|e| {
            e.unproductive_activities.push(text);
            Ok(())
        })
        .await
    }

    pub async fn remove_productive(&mut self, index: usize) -> JournalResult<()> {
        self.edit_with(|e| remove_at(&mut e.productive_activities, index)).await
    }

    pub async fn remove_unproductive(&mut self, index: usize) -> JournalResult<()> {
        self.edit_with(|e| remove_at(&mut e.unproductive_activities, index)).await
    }

    pub async fn add_activity(&mut self, kind: ActivityKind, text: &str) -> JournalResult<()> {
        match kind {
            ActivityKind::Productive => self.add_productive(text).await,
            ActivityKind::Unproductive => self.add_unproductive(text).await,
        }
    }

    /// Remove the activity listed at `position`, counting from 1
    pub async fn remove_at_position(&mut self, kind: ActivityKind, position: usize) -> JournalResult<()> {
        if self.state == EntryState::Submitted {
            return Err(ValidationError::EntryLocked.into());
        }
        let len = match kind {
            ActivityKind::Productive => self.working.productive_activities.len(),
            ActivityKind::Unproductive => self.working.unproductive_activities.len(),
        };
        let index = match position.checked_sub(1) {
            Some(index) if index < len => index,
            _ => return Err(ValidationError::NoSuchPosition(position).into()),
        };
        match kind {
            ActivityKind::Productive => self.remove_productive(index).await,
            ActivityKind::Unproductive => self.remove_unproductive(index).await,
        }
    }

    pub async fn set_feel_good(&mut self, feel_good: Option<bool>) -> JournalResult<()> {
        self.edit_with(|e| {
            e.feel_good_about_day = feel_good;
            Ok(())
        })
        .await
    }

    pub async fn set_reason(&mut self, reason: &str) -> JournalResult<()> {
        let reason = reason.to_string();
        self.edit_with(|e| {
            e.feel_good_reason = reason;
            Ok(())
        })
        .await
    }

    fn validate_submission(&self) -> Result<(), ValidationError> {
        if !self.working.has_activities() {
            return Err(ValidationError::NoActivities);
        }
        if self.working.feel_good_about_day.is_none() {
            return Err(ValidationError::MoodNotSet);
        }
        Ok(())
    }

    /// Finalize a draft, or finish editing. Rejected without any change
    /// unless there is at least one activity and a mood answer.
    pub async fn submit(&mut self) -> JournalResult<()> {
        if self.state == EntryState::Submitted {
            return Err(ValidationError::EntryLocked.into());
        }
        self.validate_submission()?;

        let previous = self.state;
        self.state = EntryState::Submitted;
        self.dirty = true;
        if let Err(e) = self.flush().await {
            self.state = previous;
            return Err(e);
        }

        self.checkpoint = None;
        info!(date = %self.working.date, "Submitted entry");
        Ok(())
    }

    /// Re-open a submitted entry
    pub fn edit(&mut self) -> JournalResult<()> {
        if self.state != EntryState::Submitted {
            return Err(ValidationError::NotSubmitted.into());
        }
        self.checkpoint = Some(self.working.clone());
        self.state = EntryState::Editing;
        debug!(date = %self.working.date, "Editing entry");
        Ok(())
    }

    async fn apply_edits(&mut self, edits: &EntryEdits) -> JournalResult<()> {
        let removals = [
            (ActivityKind::Productive, &edits.remove_productive),
            (ActivityKind::Unproductive, &edits.remove_unproductive),
        ];
        for (kind, positions) in removals {
            // Highest first so the remaining positions stay valid
            let mut positions = positions.clone();
            positions.sort_unstable_by(|a, b| b.cmp(a));
            positions.dedup();
            for position in positions {
                self.remove_at_position(kind, position).await?;
            }
        }

        for text in &edits.add_productive {
            self.add_productive(text).await?;
        }
        for text in &edits.add_unproductive {
            self.add_unproductive(text).await?;
        }
        if let Some(feel_good) = edits.feel_good {
            self.set_feel_good(feel_good).await?;
        }
        if let Some(reason) = &edits.reason {
            self.set_reason(reason).await?;
        }
        Ok(())
    }

    /// Re-open a submitted entry, apply `edits` and submit it again.
    ///
    /// If any change or the re-submit fails, the submitted record is
    /// restored and the failure returned.
    pub async fn amend(&mut self, edits: &EntryEdits) -> JournalResult<()> {
        self.edit()?;

        let outcome = match self.apply_edits(edits).await {
            Ok(()) => self.submit().await,
            Err(e) => Err(e),
        };
        let Err(e) = outcome else {
            return Ok(());
        };

        warn!(date = %self.working.date, error = %e, "Edit rejected, restoring submitted entry");
        self.cancel_edit().await?;
        Err(e)
    }

    /// Abandon editing: restore the submitted record in storage and reload it
    pub async fn cancel_edit(&mut self) -> JournalResult<()> {
        if self.state != EntryState::Editing {
            return Err(ValidationError::NotEditing.into());
        }
        let Some(checkpoint) = self.checkpoint.clone() else {
            return Err(ValidationError::NotEditing.into());
        };

        self.store.save_entry(checkpoint).await?;
        self.load(self.working.date).await?;
        info!(date = %self.working.date, "Cancelled edit");
        Ok(())
    }
}

fn activity_text(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::BlankActivity);
    }
    Ok(text.to_string())
}

fn remove_at(list: &mut Vec<String>, index: usize) -> Result<(), ValidationError> {
    if index >= list.len() {
        return Err(ValidationError::IndexOutOfRange(index));
    }
    list.remove(index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JournalError;
    use crate::kv::MemoryKv;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> (Arc<MemoryKv>, EntryStore<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        (Arc::clone(&kv), EntryStore::new(kv))
    }

    fn validation(err: JournalError) -> ValidationError {
        match err {
            JournalError::Validation(v) => v,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_opening_does_not_create_record() {
        let (kv, store) = store();
        let session = DaySession::open(store.clone(), date(2025, 3, 14)).await.unwrap();

        assert_eq!(session.state(), EntryState::Draft);
        assert!(kv.write_log().is_empty());
        assert!(store.get_entry(date(2025, 3, 14)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_edit_creates_record_and_keeps_identity() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();

        session.add_productive("  Wrote tests ").await.unwrap();
        let first = store.get_entry(d).await.unwrap().unwrap();
        assert_eq!(first.productive_activities, vec!["Wrote tests"]);
        assert!(!first.is_submitted);

        session.add_unproductive("Doomscrolled").await.unwrap();
        let second = store.get_entry(d).await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.unproductive_activities, vec!["Doomscrolled"]);
    }

    #[tokio::test]
    async fn test_blank_activity_and_bad_index_are_rejected() {
        let (kv, store) = store();
        let mut session = DaySession::open(store, date(2025, 3, 14)).await.unwrap();

        let err = session.add_productive("   ").await.unwrap_err();
        assert_eq!(validation(err), ValidationError::BlankActivity);

        let err = session.remove_unproductive(0).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::IndexOutOfRange(0));
        assert!(kv.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_order_of_remaining_activities() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();
        for text in ["one", "two", "three"] {
            session.add_productive(text).await.unwrap();
        }

        session.remove_productive(1).await.unwrap();
        let stored = store.get_entry(d).await.unwrap().unwrap();
        assert_eq!(stored.productive_activities, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_submit_requires_activity_and_mood() {
        let (kv, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();

        let err = session.submit().await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NoActivities);
        assert!(kv.write_log().is_empty());

        session.add_productive("Gym").await.unwrap();
        let writes = kv.write_log().len();
        let err = session.submit().await.unwrap_err();
        assert_eq!(validation(err), ValidationError::MoodNotSet);
        assert_eq!(session.state(), EntryState::Draft);
        assert_eq!(kv.write_log().len(), writes);
        assert!(!store.get_entry(d).await.unwrap().unwrap().is_submitted);

        session.set_feel_good(Some(false)).await.unwrap();
        assert!(session.can_submit());
        session.submit().await.unwrap();
        assert_eq!(session.state(), EntryState::Submitted);
        assert!(store.get_entry(d).await.unwrap().unwrap().is_submitted);
        assert_eq!(store.list_completed_dates().await.unwrap(), vec![d]);
    }

    #[tokio::test]
    async fn test_submitted_entry_is_read_only() {
        let (_, store) = store();
        let mut session = DaySession::open(store, date(2025, 3, 14)).await.unwrap();
        session.add_productive("Gym").await.unwrap();
        session.set_feel_good(Some(true)).await.unwrap();
        session.submit().await.unwrap();

        assert!(session.is_read_only());
        let err = session.add_productive("More").await.unwrap_err();
        assert_eq!(validation(err), ValidationError::EntryLocked);
        let err = session.submit().await.unwrap_err();
        assert_eq!(validation(err), ValidationError::EntryLocked);
        assert_eq!(session.entry().productive_activities, vec!["Gym"]);
    }

    #[tokio::test]
    async fn test_reopening_loads_submitted_state() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();
        session.add_productive("Gym").await.unwrap();
        session.set_feel_good(Some(true)).await.unwrap();
        session.submit().await.unwrap();

        let reopened = DaySession::open(store, d).await.unwrap();
        assert_eq!(reopened.state(), EntryState::Submitted);
    }

    #[tokio::test]
    async fn test_edit_then_finish_persists_changes() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();
        session.add_productive("Gym").await.unwrap();
        session.set_feel_good(Some(true)).await.unwrap();
        session.submit().await.unwrap();

        session.edit().unwrap();
        assert_eq!(session.state(), EntryState::Editing);
        session.set_reason("Slept well").await.unwrap();

        // Half-edited content is not treated as final
        let mid_edit = store.get_entry(d).await.unwrap().unwrap();
        assert!(!mid_edit.is_submitted);
        assert_eq!(mid_edit.feel_good_reason, "Slept well");

        session.submit().await.unwrap();
        let finished = store.get_entry(d).await.unwrap().unwrap();
        assert!(finished.is_submitted);
        assert_eq!(finished.feel_good_reason, "Slept well");
    }

    #[tokio::test]
    async fn test_cancel_edit_restores_submitted_record() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();
        session.add_productive("Gym").await.unwrap();
        session.set_feel_good(Some(true)).await.unwrap();
        session.submit().await.unwrap();

        session.edit().unwrap();
        session.add_productive("Extra").await.unwrap();
        session.set_feel_good(Some(false)).await.unwrap();

        session.cancel_edit().await.unwrap();
        assert_eq!(session.state(), EntryState::Submitted);
        assert_eq!(session.entry().productive_activities, vec!["Gym"]);
        assert_eq!(session.entry().feel_good_about_day, Some(true));

        let stored = store.get_entry(d).await.unwrap().unwrap();
        assert!(stored.is_submitted);
        assert_eq!(stored.productive_activities, vec!["Gym"]);
    }

    #[tokio::test]
    async fn test_state_transitions_out_of_order_are_rejected() {
        let (_, store) = store();
        let mut session = DaySession::open(store, date(2025, 3, 14)).await.unwrap();

        assert_eq!(validation(session.edit().unwrap_err()), ValidationError::NotSubmitted);
        assert_eq!(
            validation(session.cancel_edit().await.unwrap_err()),
            ValidationError::NotEditing
        );
    }

    #[tokio::test]
    async fn test_failed_autosave_stays_dirty_until_flushed() {
        let (kv, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();

        kv.set_fail_writes(true);
        let err = session.add_productive("Gym").await.unwrap_err();
        assert!(err.is_persistence());
        assert!(session.is_dirty());
        assert_eq!(session.entry().productive_activities, vec!["Gym"]);

        kv.set_fail_writes(false);
        session.flush().await.unwrap();
        assert!(!session.is_dirty());
        assert_eq!(
            store.get_entry(d).await.unwrap().unwrap().productive_activities,
            vec!["Gym"]
        );
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_previous_state() {
        let (kv, store) = store();
        let mut session = DaySession::open(store, date(2025, 3, 14)).await.unwrap();
        session.add_productive("Gym").await.unwrap();
        session.set_feel_good(Some(true)).await.unwrap();

        kv.set_fail_writes(true);
        assert!(session.submit().await.unwrap_err().is_persistence());
        assert_eq!(session.state(), EntryState::Draft);
    }

    #[tokio::test]
    async fn test_switch_date_flushes_before_loading() {
        let (kv, store) = store();
        let monday = date(2025, 3, 10);
        let tuesday = date(2025, 3, 11);

        store
            .save_entry({
                let mut e = DayEntry::new(tuesday);
                e.productive_activities.push("Planned".to_string());
                e
            })
            .await
            .unwrap();

        let mut session = DaySession::open(store.clone(), monday).await.unwrap();
        kv.set_fail_writes(true);
        assert!(session.add_productive("Unsaved").await.is_err());
        kv.set_fail_writes(false);

        let writes_before = kv.write_log().len();
        session.switch_date(tuesday).await.unwrap();

        // Monday was written exactly once, before Tuesday was loaded
        assert_eq!(kv.write_log().len(), writes_before + 1);
        assert_eq!(
            store.get_entry(monday).await.unwrap().unwrap().productive_activities,
            vec!["Unsaved"]
        );
        assert_eq!(session.date(), tuesday);
        assert_eq!(session.entry().productive_activities, vec!["Planned"]);

        // Editing Tuesday never touches Monday
        session.add_productive("Done").await.unwrap();
        assert_eq!(
            store.get_entry(monday).await.unwrap().unwrap().productive_activities,
            vec!["Unsaved"]
        );
    }

    #[tokio::test]
    async fn test_switch_date_fails_without_loading_when_flush_fails() {
        let (kv, store) = store();
        let monday = date(2025, 3, 10);
        let mut session = DaySession::open(store, monday).await.unwrap();

        kv.set_fail_writes(true);
        assert!(session.add_productive("Unsaved").await.is_err());
        assert!(session.switch_date(date(2025, 3, 11)).await.is_err());
        assert_eq!(session.date(), monday);
        assert!(session.is_dirty());
    }

    async fn submitted_day(store: &EntryStore<MemoryKv>, d: NaiveDate) -> DaySession<MemoryKv> {
        let mut session = DaySession::open(store.clone(), d).await.unwrap();
        session.add_productive("Gym").await.unwrap();
        session.add_productive("Read").await.unwrap();
        session.set_feel_good(Some(true)).await.unwrap();
        session.submit().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_remove_at_position_counts_from_one() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = DaySession::open(store.clone(), d).await.unwrap();
        for text in ["one", "two"] {
            session.add_activity(ActivityKind::Unproductive, text).await.unwrap();
        }

        let err = session.remove_at_position(ActivityKind::Unproductive, 0).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NoSuchPosition(0));
        let err = session.remove_at_position(ActivityKind::Unproductive, 3).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NoSuchPosition(3));

        session.remove_at_position(ActivityKind::Unproductive, 2).await.unwrap();
        let stored = store.get_entry(d).await.unwrap().unwrap();
        assert_eq!(stored.unproductive_activities, vec!["one"]);
    }

    #[tokio::test]
    async fn test_amend_applies_changes_and_resubmits() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = submitted_day(&store, d).await;

        let edits = EntryEdits {
            add_productive: vec!["Cooked".to_string()],
            remove_productive: vec![1, 2, 2],
            feel_good: Some(Some(false)),
            reason: Some("Long day".to_string()),
            ..Default::default()
        };
        session.amend(&edits).await.unwrap();

        assert_eq!(session.state(), EntryState::Submitted);
        let stored = store.get_entry(d).await.unwrap().unwrap();
        assert!(stored.is_submitted);
        assert_eq!(stored.productive_activities, vec!["Cooked"]);
        assert_eq!(stored.feel_good_about_day, Some(false));
        assert_eq!(stored.feel_good_reason, "Long day");
    }

    #[tokio::test]
    async fn test_amend_rejected_by_submit_restores_submitted_record() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = submitted_day(&store, d).await;

        // Removing every activity leaves nothing to submit
        let edits = EntryEdits {
            remove_productive: vec![1, 2],
            ..Default::default()
        };
        let err = session.amend(&edits).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NoActivities);

        assert_eq!(session.state(), EntryState::Submitted);
        assert_eq!(session.entry().productive_activities, vec!["Gym", "Read"]);
        let stored = store.get_entry(d).await.unwrap().unwrap();
        assert!(stored.is_submitted);
        assert_eq!(stored.productive_activities, vec!["Gym", "Read"]);
        assert_eq!(store.list_completed_dates().await.unwrap(), vec![d]);
    }

    #[tokio::test]
    async fn test_amend_with_bad_position_restores_submitted_record() {
        let (_, store) = store();
        let d = date(2025, 3, 14);
        let mut session = submitted_day(&store, d).await;

        let edits = EntryEdits {
            add_unproductive: vec!["TV".to_string()],
            remove_productive: vec![9],
            ..Default::default()
        };
        let err = session.amend(&edits).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NoSuchPosition(9));

        let stored = store.get_entry(d).await.unwrap().unwrap();
        assert!(stored.is_submitted);
        assert!(stored.unproductive_activities.is_empty());
    }

    #[tokio::test]
    async fn test_amend_requires_submitted_entry() {
        let (kv, store) = store();
        let mut session = DaySession::open(store, date(2025, 3, 14)).await.unwrap();

        let err = session.amend(&EntryEdits::default()).await.unwrap_err();
        assert_eq!(validation(err), ValidationError::NotSubmitted);
        assert!(kv.write_log().is_empty());
    }
}
