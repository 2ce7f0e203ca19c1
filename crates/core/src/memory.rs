//! In-process persistence, with failure injection for tests and local runs.

use crate::collaborators::{FinalizeAck, PersistenceService, SaveAck};
use crate::document::{SectionContent, SectionKind};
use crate::error::{FinalizeError, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use handover_ids::{ClinicianId, PatientId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Inner {
    sections: HashMap<(PatientId, SectionKind), SectionContent>,
    finalized: HashMap<PatientId, (ClinicianId, DateTime<Utc>)>,
    save_attempts: usize,
    writes: usize,
    save_failures: VecDeque<SyncError>,
    finalize_failures: VecDeque<FinalizeError>,
}

#[derive(Default)]
pub struct InMemoryPersistence {
    inner: Mutex<Inner>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next save attempt fails with `err`. Queued failures are consumed in order.
    pub fn fail_next_save(&self, err: SyncError) {
        self.lock().save_failures.push_back(err);
    }

    pub fn fail_next_finalize(&self, err: FinalizeError) {
        self.lock().finalize_failures.push_back(err);
    }

    pub fn saved(&self, patient: PatientId, section: SectionKind) -> Option<SectionContent> {
        self.lock().sections.get(&(patient, section)).cloned()
    }

    /// Every call to `save_section`, including failed and unchanged ones.
    pub fn save_attempts(&self) -> usize {
        self.lock().save_attempts
    }

    /// Saves that actually changed stored content.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn finalized_by(&self, patient: PatientId) -> Option<ClinicianId> {
        self.lock().finalized.get(&patient).map(|(actor, _)| *actor)
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn save_section(
        &self,
        patient: PatientId,
        section: SectionKind,
        content: &SectionContent,
    ) -> Result<SaveAck, SyncError> {
        let mut inner = self.lock();
        inner.save_attempts += 1;
        if let Some(err) = inner.save_failures.pop_front() {
            return Err(err);
        }
        if content.kind() != section {
            return Err(SyncError::Rejected(format!(
                "content for {} sent as {section}",
                content.kind()
            )));
        }

        let saved_at = Utc::now();
        let changed = inner.sections.get(&(patient, section)) != Some(content);
        if changed {
            inner.sections.insert((patient, section), content.clone());
            inner.writes += 1;
        }
        Ok(SaveAck { saved_at, changed })
    }

    async fn finalize_handover(
        &self,
        patient: PatientId,
        actor: ClinicianId,
    ) -> Result<FinalizeAck, FinalizeError> {
        let mut inner = self.lock();
        if let Some(err) = inner.finalize_failures.pop_front() {
            return Err(err);
        }

        match inner.finalized.get(&patient) {
            Some((by, at)) if *by == actor => Ok(FinalizeAck { finalized_at: *at }),
            Some((by, _)) => Err(FinalizeError::Rejected(format!(
                "handover for {patient} already finalized by {by}"
            ))),
            None => {
                let finalized_at = Utc::now();
                inner.finalized.insert(patient, (actor, finalized_at));
                Ok(FinalizeAck { finalized_at })
            }
        }
    }
}
