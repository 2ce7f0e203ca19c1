//! Interfaces to the systems the handover core depends on but does not own.

use crate::document::{SectionContent, SectionKind};
use crate::error::{FinalizeError, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handover_ids::{ClinicianId, PatientId};
use handover_roster::{Alert, ClinicalRole, Patient, RosterResult};
use handover_types::NonEmptyText;
use serde::Serialize;

/// Read-only source of patients and their alerts.
pub trait PatientDataProvider: Send + Sync {
    fn get_patients(&self) -> RosterResult<Vec<Patient>>;

    fn get_alerts(&self, patient: &PatientId) -> RosterResult<Vec<Alert>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveAck {
    pub saved_at: DateTime<Utc>,
    /// False when the stored content was already identical.
    pub changed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalizeAck {
    pub finalized_at: DateTime<Utc>,
}

/// Durable storage for section content and finalization records.
///
/// Saves must be idempotent: retrying a save with identical content is acknowledged
/// without side effects.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn save_section(
        &self,
        patient: PatientId,
        section: SectionKind,
        content: &SectionContent,
    ) -> Result<SaveAck, SyncError>;

    async fn finalize_handover(
        &self,
        patient: PatientId,
        actor: ClinicianId,
    ) -> Result<FinalizeAck, FinalizeError>;
}

/// Someone currently viewing or editing a patient's handover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Collaborator {
    pub id: ClinicianId,
    pub name: NonEmptyText,
    pub role: ClinicalRole,
}

#[derive(Debug, thiserror::Error)]
#[error("presence unavailable: {0}")]
pub struct PresenceError(pub String);

/// Informational feed of active collaborators. Failures never reach callers of the core.
#[async_trait]
pub trait PresenceService: Send + Sync {
    async fn list_active_collaborators(
        &self,
        patient: PatientId,
    ) -> Result<Vec<Collaborator>, PresenceError>;
}

/// Presence service used when none is configured.
pub struct NoPresence;

#[async_trait]
impl PresenceService for NoPresence {
    async fn list_active_collaborators(
        &self,
        _patient: PatientId,
    ) -> Result<Vec<Collaborator>, PresenceError> {
        Ok(Vec::new())
    }
}
