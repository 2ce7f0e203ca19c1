//! The handover store: one session behind an async lock, wired to its collaborators.
//!
//! ## Architecture
//!
//! - **Type-state pattern**: a `HandoverService<Closed>` only knows its collaborators;
//!   opening it loads the patients and yields a `HandoverService<Open>` that accepts commands
//! - **Commands return typed results**: every mutation is authorized by the
//!   [`PermissionGuard`](crate::PermissionGuard) inside the document before state changes
//! - **Optimistic edits**: a mutation is applied locally, the section is marked pending and a
//!   debounced save is spawned; the save reports back through the section's sync tracker
//!
//! The session lock is never held across a call to a collaborator.

use crate::actions::{ActionItem, NewActionItem};
use crate::collaborators::{
    Collaborator, NoPresence, PatientDataProvider, PersistenceService, PresenceService,
};
use crate::config::CoreConfig;
use crate::confirmation::{ConfirmationGate, Finalization};
use crate::contingency::{ContingencyPlan, ContingencyStatus, NewContingencyPlan};
use crate::error::FinalizeError;
use crate::document::{EditOutcome, IPassDocument, SectionKind};
use crate::session::{HandoverSession, PatientHandover, SessionSummary};
use crate::sync::{SaveTicket, SyncStatus};
use crate::HandoverResult;
use chrono::Utc;
use handover_ids::{ClinicianId, EntryId, EntryIdGenerator, PatientId};
use handover_roster::{Alert, Clinician, IllnessSeverity};
use std::sync::Arc;
use tokio::sync::Mutex;

// ============================================================================
// TYPE-STATE MARKERS
// ============================================================================

/// Marker type: collaborators configured, no session loaded yet.
#[derive(Clone)]
pub struct Closed {
    persistence: Arc<dyn PersistenceService>,
    presence: Arc<dyn PresenceService>,
}

/// Marker type: a session is open and accepts commands.
#[derive(Clone)]
pub struct Open {
    shared: Arc<Shared>,
}

struct Shared {
    cfg: Arc<CoreConfig>,
    state: Mutex<SessionState>,
    persistence: Arc<dyn PersistenceService>,
    presence: Arc<dyn PresenceService>,
    provider: Arc<dyn PatientDataProvider>,
}

struct SessionState {
    session: HandoverSession,
    online: bool,
}

// ============================================================================
// HANDOVER SERVICE
// ============================================================================

/// Generic parameter `S` is either [`Closed`] or [`Open`].
#[derive(Clone)]
pub struct HandoverService<S> {
    cfg: Arc<CoreConfig>,
    state: S,
}

impl<S> HandoverService<S> {
    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }
}

impl HandoverService<Closed> {
    /// Creates a closed service. Presence defaults to [`NoPresence`].
    pub fn new(cfg: Arc<CoreConfig>, persistence: Arc<dyn PersistenceService>) -> Self {
        Self {
            cfg,
            state: Closed {
                persistence,
                presence: Arc::new(NoPresence),
            },
        }
    }

    pub fn with_presence(mut self, presence: Arc<dyn PresenceService>) -> Self {
        self.state.presence = presence;
        self
    }

    /// Loads the patients from `provider` and opens a session with fresh documents.
    pub fn open(
        self,
        provider: Arc<dyn PatientDataProvider>,
    ) -> HandoverResult<HandoverService<Open>> {
        self.open_with_history(provider, &[])
    }

    /// Like [`open`](Self::open), carrying forward the previous shift's documents.
    pub fn open_with_history(
        self,
        provider: Arc<dyn PatientDataProvider>,
        previous: &[IPassDocument],
    ) -> HandoverResult<HandoverService<Open>> {
        let patients = provider.get_patients()?;
        let session = HandoverSession::with_history(patients, previous, &self.cfg);

        let shared = Shared {
            cfg: Arc::clone(&self.cfg),
            state: Mutex::new(SessionState {
                session,
                online: true,
            }),
            persistence: self.state.persistence,
            presence: self.state.presence,
            provider,
        };

        Ok(HandoverService {
            cfg: self.cfg,
            state: Open {
                shared: Arc::new(shared),
            },
        })
    }
}

// ============================================================================
// SESSION QUERIES AND NAVIGATION
// ============================================================================

impl HandoverService<Open> {
    fn shared(&self) -> &Arc<Shared> {
        &self.state.shared
    }

    pub async fn summary(&self) -> SessionSummary {
        self.shared().state.lock().await.session.summary()
    }

    pub async fn current_patient(&self) -> Option<PatientHandover> {
        self.shared().state.lock().await.session.current().cloned()
    }

    pub async fn next(&self) -> Option<PatientHandover> {
        self.shared().state.lock().await.session.next().cloned()
    }

    pub async fn previous(&self) -> Option<PatientHandover> {
        self.shared().state.lock().await.session.previous().cloned()
    }

    pub async fn select(&self, patient: &PatientId) -> HandoverResult<PatientHandover> {
        let mut state = self.shared().state.lock().await;
        state.session.select(patient).cloned()
    }

    pub async fn handover(&self, patient: &PatientId) -> HandoverResult<PatientHandover> {
        let state = self.shared().state.lock().await;
        state.session.get(patient).cloned()
    }

    pub async fn document(&self, patient: &PatientId) -> HandoverResult<IPassDocument> {
        let state = self.shared().state.lock().await;
        Ok(state.session.get(patient)?.document.clone())
    }

    pub async fn gate(&self, patient: &PatientId) -> HandoverResult<ConfirmationGate> {
        let state = self.shared().state.lock().await;
        Ok(state.session.get(patient)?.gate.clone())
    }

    pub async fn is_ready(&self, patient: &PatientId) -> HandoverResult<bool> {
        let state = self.shared().state.lock().await;
        Ok(state.session.get(patient)?.gate.is_ready())
    }

    pub async fn sync_status(
        &self,
        patient: &PatientId,
        section: SectionKind,
    ) -> HandoverResult<SyncStatus> {
        let state = self.shared().state.lock().await;
        Ok(state.session.get(patient)?.document.sync_status(section))
    }

    pub async fn is_online(&self) -> bool {
        self.shared().state.lock().await.online
    }
}

// ============================================================================
// SECTION COMMANDS
// ============================================================================

impl HandoverService<Open> {
    pub async fn set_illness_severity(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        severity: IllnessSeverity,
    ) -> HandoverResult<EditOutcome> {
        self.mutate(patient, SectionKind::IllnessSeverity, |entry, ids| {
            let outcome = entry
                .document
                .set_illness_severity(actor, severity, ids.stamp())?;
            Ok((outcome, outcome == EditOutcome::Applied))
        })
        .await
    }

    pub async fn set_patient_summary(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        text: &str,
    ) -> HandoverResult<EditOutcome> {
        self.mutate(patient, SectionKind::PatientSummary, |entry, ids| {
            let outcome = entry.document.set_patient_summary(actor, text, ids.stamp())?;
            Ok((outcome, outcome == EditOutcome::Applied))
        })
        .await
    }

    pub async fn set_situation_narrative(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        text: &str,
    ) -> HandoverResult<EditOutcome> {
        self.mutate(patient, SectionKind::SituationAwareness, |entry, ids| {
            let outcome = entry
                .document
                .set_situation_narrative(actor, text, ids.stamp())?;
            Ok((outcome, outcome == EditOutcome::Applied))
        })
        .await
    }

    pub async fn set_synthesis(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        text: &str,
    ) -> HandoverResult<EditOutcome> {
        self.mutate(patient, SectionKind::Synthesis, |entry, ids| {
            let outcome = entry.document.set_synthesis(actor, text, ids.stamp())?;
            Ok((outcome, outcome == EditOutcome::Applied))
        })
        .await
    }

    pub async fn add_action(
        &self,
        patient: &PatientId,
        actor: &Clinician,
        new: NewActionItem,
    ) -> HandoverResult<EntryId> {
        self.mutate(patient, SectionKind::ActionList, |entry, ids| {
            let id = entry.document.add_action(actor, new, ids.next_id())?;
            Ok((id, true))
        })
        .await
    }

    /// Returns the item's new completion state.
    pub async fn toggle_action(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        entry_id: &EntryId,
    ) -> HandoverResult<bool> {
        self.mutate(patient, SectionKind::ActionList, |entry, ids| {
            let completed = entry.document.toggle_action(actor, entry_id, ids.stamp())?;
            Ok((completed, true))
        })
        .await
    }

    pub async fn delete_action(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        entry_id: &EntryId,
    ) -> HandoverResult<ActionItem> {
        self.mutate(patient, SectionKind::ActionList, |entry, _| {
            let removed = entry.document.delete_action(actor, entry_id)?;
            Ok((removed, true))
        })
        .await
    }

    pub async fn add_contingency(
        &self,
        patient: &PatientId,
        actor: &Clinician,
        new: NewContingencyPlan,
    ) -> HandoverResult<EntryId> {
        self.mutate(patient, SectionKind::SituationAwareness, |entry, ids| {
            let id = entry.document.add_contingency(actor, new, ids.next_id())?;
            Ok((id, true))
        })
        .await
    }

    /// Returns `true` if the status changed.
    pub async fn set_contingency_status(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        entry_id: &EntryId,
        status: ContingencyStatus,
    ) -> HandoverResult<bool> {
        self.mutate(patient, SectionKind::SituationAwareness, |entry, _| {
            let changed = entry
                .document
                .set_contingency_status(actor, entry_id, status)?;
            Ok((changed, changed))
        })
        .await
    }

    pub async fn delete_contingency(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        entry_id: &EntryId,
    ) -> HandoverResult<ContingencyPlan> {
        let rule = self.cfg.contingency_delete_rule();
        self.mutate(patient, SectionKind::SituationAwareness, |entry, _| {
            let removed = entry.document.delete_contingency(actor, entry_id, rule)?;
            Ok((removed, true))
        })
        .await
    }

    /// Applies a document mutation under the session lock. When the closure reports a
    /// change, the section is marked pending and a debounced save is scheduled.
    async fn mutate<R>(
        &self,
        patient: &PatientId,
        section: SectionKind,
        f: impl FnOnce(&mut PatientHandover, &mut EntryIdGenerator) -> HandoverResult<(R, bool)>,
    ) -> HandoverResult<R> {
        let (value, ticket) = {
            let mut state = self.shared().state.lock().await;
            state.session.with_entry(patient, |entry, ids| {
                let (value, changed) = f(entry, ids)?;
                let ticket = changed.then(|| entry.document.mark_edited(section));
                Ok((value, ticket))
            })?
        };

        if let Some(ticket) = ticket {
            tracing::debug!(patient = %patient, %section, "section pending save");
            self.schedule_save(*patient, section, ticket);
        }
        Ok(value)
    }

    fn schedule_save(&self, patient: PatientId, section: SectionKind, ticket: SaveTicket) {
        let shared = Arc::clone(self.shared());
        tokio::spawn(async move { shared.run_save(patient, section, ticket).await });
    }
}

// ============================================================================
// CONFIRMATION COMMANDS
// ============================================================================

impl HandoverService<Open> {
    pub async fn check_item(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
        item_id: &str,
        checked: bool,
    ) -> HandoverResult<()> {
        let mut state = self.shared().state.lock().await;
        state.session.with_entry(patient, |entry, ids| {
            entry.gate.check(item_id, checked, actor, ids.stamp())
        })
    }

    /// Finalizes a patient's handover.
    ///
    /// The gate is reserved under the session lock, which freezes the checklist. The
    /// persistence collaborator then records the finalization, and the reservation is
    /// committed on success or released on failure. The record is written by a spawned task,
    /// so the reservation always resolves even if the caller stops waiting.
    pub async fn finalize(
        &self,
        patient: &PatientId,
        actor: ClinicianId,
    ) -> HandoverResult<Finalization> {
        {
            let mut state = self.shared().state.lock().await;
            state.session.begin_finalize(patient, actor)?;
        }

        let shared = Arc::clone(self.shared());
        let patient = *patient;
        let task = tokio::spawn(async move { shared.run_finalize(patient, actor).await });

        match task.await {
            Ok(result) => result,
            Err(err) => {
                let mut state = self.shared().state.lock().await;
                state.session.abort_finalize(&patient, actor);
                tracing::error!(patient = %patient, %actor, error = %err, "finalize task failed");
                Err(FinalizeError::Unavailable(format!("finalize task failed: {err}")).into())
            }
        }
    }
}

// ============================================================================
// CONNECTIVITY, ALERTS AND PRESENCE
// ============================================================================

impl HandoverService<Open> {
    /// Records a connectivity change reported by the outer layer. Sections with unsaved
    /// edits are retried on reconnect.
    pub async fn set_online(&self, online: bool) {
        let retries: Vec<(PatientId, SectionKind, SaveTicket)> = {
            let mut state = self.shared().state.lock().await;
            if state.online == online {
                return;
            }
            state.online = online;

            let mut retries = Vec::new();
            for entry in state.session.entries_mut() {
                let patient = entry.patient.id;
                for (section, ticket) in entry.document.set_offline(!online) {
                    retries.push((patient, section, ticket));
                }
            }
            retries
        };

        tracing::info!(online, retries = retries.len(), "connectivity changed");
        for (patient, section, ticket) in retries {
            self.schedule_save(patient, section, ticket);
        }
    }

    /// Active alerts for a patient in this session, highest level first.
    pub async fn alerts(&self, patient: &PatientId) -> HandoverResult<Vec<Alert>> {
        {
            let state = self.shared().state.lock().await;
            state.session.get(patient)?;
        }
        Ok(self.shared().provider.get_alerts(patient)?)
    }

    /// Who else is working on this patient. Presence failures degrade to an empty list.
    pub async fn active_collaborators(&self, patient: &PatientId) -> Vec<Collaborator> {
        match self
            .shared()
            .presence
            .list_active_collaborators(*patient)
            .await
        {
            Ok(collaborators) => collaborators,
            Err(err) => {
                tracing::warn!(patient = %patient, error = %err, "presence unavailable");
                Vec::new()
            }
        }
    }
}

// ============================================================================
// BACKGROUND SAVES
// ============================================================================

impl Shared {
    /// Records a reserved finalization with the persistence collaborator, then commits or
    /// releases the reservation.
    async fn run_finalize(
        &self,
        patient: PatientId,
        actor: ClinicianId,
    ) -> HandoverResult<Finalization> {
        let recorded = self.persistence.finalize_handover(patient, actor).await;

        let mut state = self.state.lock().await;
        match recorded {
            Ok(_) => state.session.finalize(&patient, actor),
            Err(err) => {
                state.session.abort_finalize(&patient, actor);
                tracing::warn!(patient = %patient, %actor, error = %err, "finalize not recorded");
                Err(err.into())
            }
        }
    }

    /// Waits out the debounce, then saves the section if `ticket` is still the latest edit.
    ///
    /// Transient failures are retried with backoff while the edit stays current. Whatever
    /// the final outcome, it is reported to the section tracker, which ignores it if a
    /// newer edit arrived in the meantime.
    async fn run_save(&self, patient: PatientId, section: SectionKind, ticket: SaveTicket) {
        tokio::time::sleep(self.cfg.save_debounce()).await;

        let policy = self.cfg.retry_policy();
        let mut attempt = 1;
        loop {
            let content = {
                let state = self.state.lock().await;
                match state.session.get(&patient) {
                    Ok(entry) if entry.document.should_persist(section, ticket) => {
                        entry.document.snapshot(section)
                    }
                    _ => return,
                }
            };

            let result = self
                .persistence
                .save_section(patient, section, &content)
                .await;

            if let Err(err) = &result {
                if err.is_transient() && attempt < policy.max_attempts {
                    let backoff = policy.backoff_for(attempt);
                    tracing::warn!(
                        patient = %patient,
                        %section,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "section save failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
            }

            let mut state = self.state.lock().await;
            let Ok(entry) = state.session.get_mut(&patient) else {
                return;
            };
            let applied = entry.document.complete_save(
                section,
                ticket,
                result.as_ref().map(|_| ()),
                content,
                Utc::now(),
            );

            match (&result, applied) {
                (Ok(ack), true) => {
                    tracing::debug!(patient = %patient, %section, changed = ack.changed, "section synced")
                }
                (Err(err), true) => {
                    tracing::warn!(patient = %patient, %section, attempt, error = %err, "section save failed")
                }
                (_, false) => {
                    tracing::debug!(patient = %patient, %section, "save result superseded by a newer edit")
                }
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::PresenceError;
    use crate::config::RetryPolicy;
    use crate::document::{DocumentStatus, SectionContent};
    use crate::error::{HandoverError, PermissionError, SyncError};
    use crate::memory::InMemoryPersistence;
    use crate::provider::StaticRoster;
    use crate::{ErrorKind, SeedStrategy};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use handover_roster::{AlertLevel, AlertStatus, ClinicalRole, Patient, RosterData};
    use handover_types::{NonEmptyText, ShiftTag};
    use std::path::PathBuf;
    use std::time::Duration;

    struct Ward {
        johnson: Clinician,
        patel: Clinician,
        park: Clinician,
        nurse: Clinician,
        maria: Patient,
    }

    fn clinician(name: &str, role: ClinicalRole) -> Clinician {
        Clinician::new(ClinicianId::new(), NonEmptyText::new(name).unwrap(), role)
    }

    fn text(s: &str) -> NonEmptyText {
        NonEmptyText::new(s).unwrap()
    }

    fn ward() -> Ward {
        let johnson = clinician("Dr. Johnson", ClinicalRole::Physician);
        let patel = clinician("Dr. Patel", ClinicalRole::Physician);
        let park = clinician("Dr. Park", ClinicalRole::Physician);
        let nurse = clinician("Nurse Kim", ClinicalRole::Nurse);
        let maria = Patient {
            id: PatientId::new(),
            name: text("Maria Rodriguez"),
            room: text("PICU-01"),
            mrn: text("MRN-004512"),
            illness_severity: IllnessSeverity::Watcher,
            diagnosis: Some(text("Septic shock")),
            assigned_physician: johnson.clone(),
            receiving_physician: patel.clone(),
            alerts: vec![Alert {
                level: AlertLevel::High,
                status: AlertStatus::Active,
                description: text("Penicillin allergy"),
                created_by: text("Dr. Johnson"),
                created_at: Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap(),
                source: text("pharmacy"),
            }],
        };
        Ward {
            johnson,
            patel,
            park,
            nurse,
            maria,
        }
    }

    fn cfg(shift: &str) -> CoreConfig {
        CoreConfig::new(PathBuf::from("/tmp/handover"), shift.parse().unwrap())
    }

    fn provider(ward: &Ward) -> Arc<dyn PatientDataProvider> {
        Arc::new(StaticRoster::new(RosterData {
            patients: vec![ward.maria.clone()],
            staff: vec![ward.nurse.clone()],
        }))
    }

    fn open(
        ward: &Ward,
        cfg: CoreConfig,
    ) -> (HandoverService<Open>, Arc<InMemoryPersistence>) {
        let store = Arc::new(InMemoryPersistence::new());
        let service = HandoverService::new(Arc::new(cfg), store.clone())
            .open(provider(ward))
            .unwrap();
        (service, store)
    }

    /// Lets every pending debounce, save and backoff run to completion.
    async fn settle() {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }

    // Scenario A
    #[tokio::test(start_paused = true)]
    async fn assigned_physician_edits_severity_and_others_are_denied() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        let outcome = service
            .set_illness_severity(&maria, ward.johnson.id, IllnessSeverity::Unstable)
            .await
            .unwrap();
        assert_eq!(outcome, EditOutcome::Applied);
        assert_eq!(
            service
                .sync_status(&maria, SectionKind::IllnessSeverity)
                .await
                .unwrap(),
            SyncStatus::Pending
        );

        settle().await;
        assert_eq!(
            service
                .sync_status(&maria, SectionKind::IllnessSeverity)
                .await
                .unwrap(),
            SyncStatus::Synced
        );
        assert_eq!(
            store.saved(maria, SectionKind::IllnessSeverity),
            Some(SectionContent::IllnessSeverity(Some(
                IllnessSeverity::Unstable
            )))
        );

        let err = service
            .set_illness_severity(&maria, ward.patel.id, IllnessSeverity::Stable)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandoverError::Permission(PermissionError::NotAssignedPhysician { .. })
        ));

        let doc = service.document(&maria).await.unwrap();
        assert_eq!(
            doc.illness_severity().content,
            Some(IllnessSeverity::Unstable)
        );
        assert_eq!(doc.illness_severity().last_edited_by, Some(ward.johnson.id));
        assert_eq!(
            doc.sync_status(SectionKind::IllnessSeverity),
            SyncStatus::Synced
        );
    }

    // Scenario B
    #[tokio::test(start_paused = true)]
    async fn finalize_requires_every_required_item() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        let required: Vec<String> = service
            .gate(&maria)
            .await
            .unwrap()
            .items()
            .iter()
            .filter(|i| i.required)
            .map(|i| i.id.clone())
            .collect();
        assert_eq!(required.len(), 6);

        for id in &required[..5] {
            service
                .check_item(&maria, ward.patel.id, id, true)
                .await
                .unwrap();
        }
        assert!(!service.is_ready(&maria).await.unwrap());
        let err = service.finalize(&maria, ward.patel.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert_eq!(store.finalized_by(maria), None);

        service
            .check_item(&maria, ward.patel.id, &required[5], true)
            .await
            .unwrap();
        assert!(service.is_ready(&maria).await.unwrap());

        let before = service.summary().await.completed_count;
        service.finalize(&maria, ward.patel.id).await.unwrap();
        let summary = service.summary().await;
        assert_eq!(summary.completed_count, before + 1);
        assert_eq!(summary.progress_percentage, 100.0);
        assert_eq!(
            service.document(&maria).await.unwrap().status(),
            DocumentStatus::Confirmed
        );
        assert_eq!(store.finalized_by(maria), Some(ward.patel.id));

        let err = service.finalize(&maria, ward.patel.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyFinalized);
        assert_eq!(service.summary().await.completed_count, before + 1);
    }

    // Scenario C
    #[tokio::test(start_paused = true)]
    async fn carried_action_cannot_be_deleted_in_a_later_shift_but_can_be_completed() {
        let ward = ward();
        let night_day: ShiftTag = "Night→Day".parse().unwrap();

        let mut previous = IPassDocument::new(&ward.maria, night_day, SeedStrategy::FromPatient);
        let mut ids = EntryIdGenerator::new();
        let item = previous
            .add_action(
                &ward.park,
                NewActionItem::new("Follow up on blood culture", Default::default()),
                ids.next_id(),
            )
            .unwrap();

        let store = Arc::new(InMemoryPersistence::new());
        let service = HandoverService::new(Arc::new(cfg("Day→Evening")), store)
            .open_with_history(provider(&ward), &[previous])
            .unwrap();
        let maria = ward.maria.id;

        let err = service
            .delete_action(&maria, ward.johnson.id, &item)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandoverError::Permission(PermissionError::ActionDeleteDenied(_))
        ));
        assert!(service
            .document(&maria)
            .await
            .unwrap()
            .actions()
            .get(&item)
            .is_some());

        let completed = service
            .toggle_action(&maria, ward.nurse.id, &item)
            .await
            .unwrap();
        assert!(completed);
        let doc = service.document(&maria).await.unwrap();
        let carried = doc.actions().get(&item).unwrap();
        assert!(carried.completed);
        assert_eq!(carried.completed_by, Some(ward.nurse.id));
        assert_eq!(carried.shift_tag, night_day);

        // New entries sort after carried ones.
        let fresh = service
            .add_action(
                &maria,
                &ward.nurse,
                NewActionItem::new("Recheck temperature", Default::default()),
            )
            .await
            .unwrap();
        assert!(fresh > item);
    }

    // Scenario D
    #[tokio::test(start_paused = true)]
    async fn failed_save_stays_in_error_until_the_next_edit() {
        let ward = ward();
        let cfg = cfg("Night→Day")
            .with_retry_policy(RetryPolicy::none())
            .unwrap();
        let (service, store) = open(&ward, cfg);
        let maria = ward.maria.id;
        let section = SectionKind::PatientSummary;

        store.fail_next_save(SyncError::Unavailable("simulated network error".into()));
        service
            .set_patient_summary(&maria, ward.johnson.id, "Day 3 of septic shock")
            .await
            .unwrap();
        settle().await;
        assert_eq!(
            service.sync_status(&maria, section).await.unwrap(),
            SyncStatus::Error
        );
        assert_eq!(store.save_attempts(), 1);
        assert_eq!(store.saved(maria, section), None);

        settle().await;
        assert_eq!(
            service.sync_status(&maria, section).await.unwrap(),
            SyncStatus::Error
        );
        assert_eq!(store.save_attempts(), 1);

        service
            .set_patient_summary(&maria, ward.johnson.id, "Day 3 of septic shock, improving")
            .await
            .unwrap();
        assert_eq!(
            service.sync_status(&maria, section).await.unwrap(),
            SyncStatus::Pending
        );
        settle().await;
        assert_eq!(
            service.sync_status(&maria, section).await.unwrap(),
            SyncStatus::Synced
        );
        assert_eq!(store.save_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        store.fail_next_save(SyncError::Unavailable("timeout".into()));
        store.fail_next_save(SyncError::Unavailable("timeout".into()));
        service
            .set_situation_narrative(&maria, ward.nurse.id, "Parents at bedside overnight")
            .await
            .unwrap();

        settle().await;
        assert_eq!(store.save_attempts(), 3);
        assert_eq!(
            service
                .sync_status(&maria, SectionKind::SituationAwareness)
                .await
                .unwrap(),
            SyncStatus::Synced
        );
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        store.fail_next_save(SyncError::Rejected("schema".into()));
        service
            .set_synthesis(&maria, ward.patel.id, "Agree with plan")
            .await
            .unwrap();

        settle().await;
        assert_eq!(store.save_attempts(), 1);
        assert_eq!(
            service
                .sync_status(&maria, SectionKind::Synthesis)
                .await
                .unwrap(),
            SyncStatus::Error
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_are_debounced_into_one_save() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        for draft in ["Day 3", "Day 3 of", "Day 3 of septic shock"] {
            service
                .set_patient_summary(&maria, ward.johnson.id, draft)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        settle().await;
        assert_eq!(store.save_attempts(), 1);
        assert_eq!(
            store.saved(maria, SectionKind::PatientSummary),
            Some(SectionContent::PatientSummary(Some(text(
                "Day 3 of septic shock"
            ))))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn offline_edits_are_saved_after_reconnect() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;
        let section = SectionKind::ActionList;

        service.set_online(false).await;
        service
            .add_action(
                &maria,
                &ward.nurse,
                NewActionItem::new("Repeat lactate", Default::default()),
            )
            .await
            .unwrap();
        settle().await;
        assert_eq!(
            service.sync_status(&maria, section).await.unwrap(),
            SyncStatus::Offline
        );
        assert_eq!(store.save_attempts(), 0);

        service.set_online(true).await;
        assert_eq!(
            service.sync_status(&maria, section).await.unwrap(),
            SyncStatus::Pending
        );
        settle().await;
        assert_eq!(
            service.sync_status(&maria, section).await.unwrap(),
            SyncStatus::Synced
        );
        assert_eq!(store.save_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn contingencies_are_open_to_everyone_but_deleted_by_the_assigned_physician() {
        let ward = ward();
        let (service, _store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        let plan = service
            .add_contingency(
                &maria,
                &ward.nurse,
                NewContingencyPlan::new("If MAP < 65", "Start norepinephrine"),
            )
            .await
            .unwrap();
        assert!(service
            .set_contingency_status(&maria, ward.nurse.id, &plan, ContingencyStatus::Planned)
            .await
            .unwrap());

        let err = service
            .delete_contingency(&maria, ward.nurse.id, &plan)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        let removed = service
            .delete_contingency(&maria, ward.johnson.id, &plan)
            .await
            .unwrap();
        assert_eq!(removed.status, ContingencyStatus::Planned);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_does_not_touch_documents() {
        let ward = ward();
        let (service, _store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        service
            .set_patient_summary(&maria, ward.johnson.id, "Stable overnight")
            .await
            .unwrap();
        assert_eq!(service.next().await.unwrap().patient.id, maria);
        assert_eq!(service.previous().await.unwrap().patient.id, maria);
        assert_eq!(
            service.current_patient().await.unwrap().document.patient_summary(),
            service.document(&maria).await.unwrap().patient_summary()
        );

        let err = service.select(&PatientId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_text_is_rejected_before_any_state_change() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        let err = service
            .set_situation_narrative(&maria, ward.nurse.id, "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            service
                .sync_status(&maria, SectionKind::SituationAwareness)
                .await
                .unwrap(),
            SyncStatus::Synced
        );
        settle().await;
        assert_eq!(store.save_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn alerts_come_from_the_provider() {
        let ward = ward();
        let (service, _store) = open(&ward, cfg("Night→Day"));

        let alerts = service.alerts(&ward.maria.id).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].description, "Penicillin allergy");

        let err = service.alerts(&PatientId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    struct BrokenPresence;

    #[async_trait]
    impl PresenceService for BrokenPresence {
        async fn list_active_collaborators(
            &self,
            _patient: PatientId,
        ) -> Result<Vec<Collaborator>, PresenceError> {
            Err(PresenceError("feed disconnected".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn presence_failures_degrade_to_an_empty_list() {
        let ward = ward();
        let (service, _store) = open(&ward, cfg("Night→Day"));
        assert!(service.active_collaborators(&ward.maria.id).await.is_empty());

        let broken = HandoverService::new(
            Arc::new(cfg("Night→Day")),
            Arc::new(InMemoryPersistence::new()),
        )
        .with_presence(Arc::new(BrokenPresence))
        .open(provider(&ward))
        .unwrap();
        assert!(broken.active_collaborators(&ward.maria.id).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_failure_leaves_the_gate_open() {
        let ward = ward();
        let (service, store) = open(&ward, cfg("Night→Day"));
        let maria = ward.maria.id;

        let gate = service.gate(&maria).await.unwrap();
        for item in gate.items().iter().filter(|i| i.required) {
            service
                .check_item(&maria, ward.patel.id, &item.id, true)
                .await
                .unwrap();
        }

        store.fail_next_finalize(crate::FinalizeError::Unavailable("offline".into()));
        let err = service.finalize(&maria, ward.patel.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Finalize);
        assert_eq!(service.summary().await.completed_count, 0);
        assert!(!service.gate(&maria).await.unwrap().is_finalizing());

        service
            .check_item(&maria, ward.patel.id, "family-updated", true)
            .await
            .unwrap();
        service.finalize(&maria, ward.patel.id).await.unwrap();
        assert_eq!(service.summary().await.completed_count, 1);
    }

    /// Holds every `finalize_handover` call until the test releases it.
    #[derive(Default)]
    struct HeldFinalize {
        inner: InMemoryPersistence,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl PersistenceService for HeldFinalize {
        async fn save_section(
            &self,
            patient: PatientId,
            section: SectionKind,
            content: &SectionContent,
        ) -> Result<crate::SaveAck, SyncError> {
            self.inner.save_section(patient, section, content).await
        }

        async fn finalize_handover(
            &self,
            patient: PatientId,
            actor: ClinicianId,
        ) -> Result<crate::FinalizeAck, crate::FinalizeError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.finalize_handover(patient, actor).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn checklist_is_frozen_while_the_finalization_is_recorded() {
        let ward = ward();
        let store = Arc::new(HeldFinalize::default());
        let service = HandoverService::new(Arc::new(cfg("Night→Day")), store.clone())
            .open(provider(&ward))
            .unwrap();
        let maria = ward.maria.id;
        let patel = ward.patel.id;

        let gate = service.gate(&maria).await.unwrap();
        for item in gate.items().iter().filter(|i| i.required) {
            service
                .check_item(&maria, patel, &item.id, true)
                .await
                .unwrap();
        }

        let pending = tokio::spawn({
            let service = service.clone();
            async move { service.finalize(&maria, patel).await }
        });
        store.entered.notified().await;

        let err = service
            .check_item(&maria, patel, "questions-answered", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FinalizeInProgress);
        let err = service.finalize(&maria, patel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FinalizeInProgress);
        assert_eq!(service.summary().await.completed_count, 0);

        store.release.notify_one();
        let finalization = pending.await.unwrap().unwrap();
        assert_eq!(finalization.finalized_by, patel);

        assert_eq!(store.inner.finalized_by(maria), Some(patel));
        assert_eq!(service.summary().await.completed_count, 1);
        let gate = service.gate(&maria).await.unwrap();
        assert!(gate.is_ready());
        assert!(gate.is_finalized());
        assert_eq!(
            service.document(&maria).await.unwrap().status(),
            DocumentStatus::Confirmed
        );
    }
}
