use crate::document::SectionKind;
use handover_ids::{EntryId, PatientId};
use handover_types::TextError;

/// Every error that crosses a component boundary in the handover core.
///
/// Callers get typed results, never panics: a [`PermissionError`] is reported like any
/// other failure and leaves state untouched.
#[derive(Debug, thiserror::Error)]
pub enum HandoverError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("permission denied: {0}")]
    Permission(#[from] PermissionError),

    #[error("handover is not ready to finalize: {missing} required checklist item(s) unchecked")]
    NotReady { missing: usize },

    #[error("handover has already been finalized")]
    AlreadyFinalized,

    #[error("handover finalization is already in progress")]
    FinalizeInProgress,

    #[error("section save failed: {0}")]
    Sync(#[from] SyncError),

    #[error("finalize failed: {0}")]
    Finalize(#[from] FinalizeError),

    #[error("patient data error: {0}")]
    PatientData(#[from] handover_roster::RosterError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of [`HandoverError`] for callers that only need to branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Permission,
    NotReady,
    AlreadyFinalized,
    FinalizeInProgress,
    Sync,
    Finalize,
    PatientData,
    Config,
}

impl HandoverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Permission(_) => ErrorKind::Permission,
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::AlreadyFinalized => ErrorKind::AlreadyFinalized,
            Self::FinalizeInProgress => ErrorKind::FinalizeInProgress,
            Self::Sync(_) => ErrorKind::Sync,
            Self::Finalize(_) => ErrorKind::Finalize,
            Self::PatientData(_) => ErrorKind::PatientData,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn text(field: &'static str) -> impl Fn(TextError) -> HandoverError {
        move |source| HandoverError::Validation(ValidationError::Text { field, source })
    }
}

/// Input rejected before any state was touched.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: {source}")]
    Text {
        field: &'static str,
        #[source]
        source: TextError,
    },

    #[error("unknown patient {0}")]
    UnknownPatient(PatientId),

    #[error("unknown entry {0}")]
    UnknownEntry(EntryId),

    #[error("unknown checklist item '{0}'")]
    UnknownChecklistItem(String),

    #[error("checklist item '{0}' cannot be unchecked once checked")]
    IrrevocableItem(String),

    #[error("{0}")]
    Invalid(String),
}

/// The actor is not allowed to perform the requested mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("only the assigned physician may edit {section}")]
    NotAssignedPhysician { section: SectionKind },

    #[error("only the receiving physician may {action}")]
    NotReceivingPhysician { action: &'static str },

    #[error("action item {0} can only be deleted by the assigned physician during the shift that created it, before completion")]
    ActionDeleteDenied(EntryId),

    #[error("contingency plan {0} can only be deleted by the assigned physician")]
    ContingencyDeleteDenied(EntryId),
}

/// A section save did not reach durable storage.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    #[error("save rejected: {0}")]
    Rejected(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize section: {0}")]
    Serialization(String),
}

impl SyncError {
    /// Transient failures may succeed when retried with the same content.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// The persistence collaborator did not record a finalization.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    #[error("finalization rejected: {0}")]
    Rejected(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize handover record: {0}")]
    Serialization(String),
}

pub type HandoverResult<T> = std::result::Result<T, HandoverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classifies_each_variant() {
        let err: HandoverError = ValidationError::UnknownChecklistItem("x".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: HandoverError = PermissionError::NotReceivingPhysician {
            action: "finalize the handover",
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(err.to_string().contains("receiving physician"));

        assert_eq!(
            HandoverError::NotReady { missing: 1 }.kind(),
            ErrorKind::NotReady
        );
        assert_eq!(
            HandoverError::from(SyncError::Unavailable("down".into())).kind(),
            ErrorKind::Sync
        );
    }

    #[test]
    fn only_unavailable_and_io_are_transient() {
        assert!(SyncError::Unavailable("timeout".into()).is_transient());
        assert!(SyncError::Io(std::io::Error::other("disk")).is_transient());
        assert!(!SyncError::Rejected("conflict".into()).is_transient());
        assert!(!SyncError::Serialization("bad".into()).is_transient());
    }
}
