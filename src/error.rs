// Error taxonomy for journal and task operations

use thiserror::Error;

/// Result alias used by every store operation
pub type JournalResult<T> = Result<T, JournalError>;

#[derive(Debug, Error)]
pub enum JournalError {
    /// The caller asked for something the current state does not allow.
    /// Nothing was mutated.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The persistence backend failed. The previous snapshot is intact.
    #[error("persistence failure: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// Writing an export file failed
    #[error("export failed: {0}")]
    Export(#[source] std::io::Error),
}

impl JournalError {
    pub fn is_validation(&self) -> bool {
        matches!(self, JournalError::Validation(_))
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, JournalError::Persistence(_))
    }
}

impl From<eyre::Report> for JournalError {
    fn from(report: eyre::Report) -> Self {
        JournalError::Persistence(report.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("add at least one activity before submitting")]
    NoActivities,
    #[error("say how you feel about your day before submitting")]
    MoodNotSet,
    #[error("entry is submitted; start editing to change it")]
    EntryLocked,
    #[error("entry is not being edited")]
    NotEditing,
    #[error("entry has not been submitted")]
    NotSubmitted,
    #[error("activity text is blank")]
    BlankActivity,
    #[error("no activity at index {0}")]
    IndexOutOfRange(usize),
    /// Positions count from 1, as listed to the user
    #[error("no activity at position {0}")]
    NoSuchPosition(usize),
}
