//! The patient queue for one shift transition.
//!
//! A session owns one [`IPassDocument`] and one [`ConfirmationGate`] per patient. Navigation
//! only moves the cursor; it never touches document state. A patient counts as complete only
//! once its gate has been finalized.

use crate::config::CoreConfig;
use crate::confirmation::{ConfirmationGate, Finalization};
use crate::document::{DocumentStatus, IPassDocument};
use crate::error::ValidationError;
use crate::sync::SyncStatus;
use crate::HandoverResult;
use chrono::{DateTime, Utc};
use handover_ids::{ClinicianId, EntryId, EntryIdGenerator, PatientId};
use handover_roster::Patient;
use handover_types::{NonEmptyText, ShiftTag};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
pub struct PatientHandover {
    pub patient: Patient,
    pub document: IPassDocument,
    pub gate: ConfirmationGate,
}

#[derive(Debug)]
pub struct HandoverSession {
    shift: ShiftTag,
    entries: Vec<PatientHandover>,
    current_index: usize,
    started_at: Instant,
    ids: EntryIdGenerator,
}

/// Progress of a single patient, as reported in a [`SessionSummary`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatientProgress {
    pub patient_id: PatientId,
    pub name: NonEmptyText,
    pub room: NonEmptyText,
    pub status: DocumentStatus,
    pub sync_status: SyncStatus,
    pub ready: bool,
    pub finalized_by: Option<ClinicianId>,
}

/// A serializable view of the session for outer layers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub shift: ShiftTag,
    pub current_index: Option<usize>,
    pub current_patient: Option<PatientId>,
    pub total_patients: usize,
    pub completed_count: usize,
    pub progress_percentage: f64,
    pub elapsed_seconds: u64,
    pub patients: Vec<PatientProgress>,
}

impl HandoverSession {
    /// Starts a session with a fresh document for every patient.
    pub fn new(patients: Vec<Patient>, cfg: &CoreConfig) -> Self {
        Self::with_history(patients, &[], cfg)
    }

    /// Starts a session, carrying forward the previous shift's document where one exists
    /// for the patient.
    pub fn with_history(
        patients: Vec<Patient>,
        previous: &[IPassDocument],
        cfg: &CoreConfig,
    ) -> Self {
        let shift = cfg.current_shift();
        let mut ids = EntryIdGenerator::new();

        let entries = patients
            .into_iter()
            .map(|patient| {
                let document = match previous.iter().find(|d| d.patient_id() == patient.id) {
                    Some(prev) => {
                        if let Some(latest) = prev.latest_entry_id() {
                            ids.observe(&latest);
                        }
                        IPassDocument::carried_forward(&patient, prev, shift)
                    }
                    None => IPassDocument::new(&patient, shift, cfg.seed_strategy()),
                };
                let gate = ConfirmationGate::new(patient.receiving_physician.id, cfg.checklist());
                PatientHandover {
                    patient,
                    document,
                    gate,
                }
            })
            .collect::<Vec<_>>();

        tracing::info!(%shift, patients = entries.len(), "handover session started");

        Self {
            shift,
            entries,
            current_index: 0,
            started_at: Instant::now(),
            ids,
        }
    }

    pub fn shift(&self) -> ShiftTag {
        self.shift
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PatientHandover] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [PatientHandover] {
        &mut self.entries
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.current_index)
    }

    pub fn current(&self) -> Option<&PatientHandover> {
        self.entries.get(self.current_index)
    }

    /// Moves to the next patient if there is one.
    pub fn next(&mut self) -> Option<&PatientHandover> {
        if self.current_index + 1 < self.entries.len() {
            self.current_index += 1;
        }
        self.current()
    }

    /// Moves to the previous patient if there is one.
    pub fn previous(&mut self) -> Option<&PatientHandover> {
        self.current_index = self.current_index.saturating_sub(1);
        self.current()
    }

    pub fn select(&mut self, patient: &PatientId) -> HandoverResult<&PatientHandover> {
        let index = self.position(patient)?;
        self.current_index = index;
        Ok(&self.entries[index])
    }

    pub fn get(&self, patient: &PatientId) -> HandoverResult<&PatientHandover> {
        let index = self.position(patient)?;
        Ok(&self.entries[index])
    }

    pub fn get_mut(&mut self, patient: &PatientId) -> HandoverResult<&mut PatientHandover> {
        let index = self.position(patient)?;
        Ok(&mut self.entries[index])
    }

    fn position(&self, patient: &PatientId) -> HandoverResult<usize> {
        self.entries
            .iter()
            .position(|e| e.patient.id == *patient)
            .ok_or_else(|| ValidationError::UnknownPatient(*patient).into())
    }

    /// Runs `f` against one patient's handover together with the session's id generator.
    pub(crate) fn with_entry<R>(
        &mut self,
        patient: &PatientId,
        f: impl FnOnce(&mut PatientHandover, &mut EntryIdGenerator) -> HandoverResult<R>,
    ) -> HandoverResult<R> {
        let index = self.position(patient)?;
        f(&mut self.entries[index], &mut self.ids)
    }

    pub fn stamp(&mut self) -> DateTime<Utc> {
        self.ids.stamp()
    }

    pub fn next_entry_id(&mut self) -> EntryId {
        self.ids.next_id()
    }

    pub fn completed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.gate.is_finalized())
            .count()
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.entries.len() as f64 * 100.0
    }

    /// Monotonic time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Reserves a patient's gate for finalization. See [`ConfirmationGate::begin_finalize`].
    pub(crate) fn begin_finalize(
        &mut self,
        patient: &PatientId,
        actor: ClinicianId,
    ) -> HandoverResult<()> {
        self.with_entry(patient, |entry, _| entry.gate.begin_finalize(actor))
    }

    pub(crate) fn abort_finalize(&mut self, patient: &PatientId, actor: ClinicianId) {
        if let Ok(entry) = self.get_mut(patient) {
            entry.gate.abort_finalize(actor);
        }
    }

    /// Commits a reserved finalization and confirms the document.
    pub(crate) fn finalize(
        &mut self,
        patient: &PatientId,
        actor: ClinicianId,
    ) -> HandoverResult<Finalization> {
        let finalization = self.with_entry(patient, |entry, ids| {
            let finalization = entry.gate.commit_finalize(actor, ids.stamp())?;
            entry.document.mark_confirmed();
            Ok(finalization)
        })?;

        tracing::info!(
            patient = %patient,
            %actor,
            completed = self.completed_count(),
            total = self.len(),
            "handover finalized"
        );
        Ok(finalization)
    }

    pub fn summary(&self) -> SessionSummary {
        let patients = self
            .entries
            .iter()
            .map(|e| PatientProgress {
                patient_id: e.patient.id,
                name: e.patient.name.clone(),
                room: e.patient.room.clone(),
                status: e.document.status(),
                sync_status: e.document.overall_sync_status(),
                ready: e.gate.is_ready(),
                finalized_by: e.gate.finalization().map(|f| f.finalized_by),
            })
            .collect();

        SessionSummary {
            shift: self.shift,
            current_index: self.current_index(),
            current_patient: self.current().map(|e| e.patient.id),
            total_patients: self.len(),
            completed_count: self.completed_count(),
            progress_percentage: self.progress_percentage(),
            elapsed_seconds: self.elapsed().as_secs(),
            patients,
        }
    }
}
