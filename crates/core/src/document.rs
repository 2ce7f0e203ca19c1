//! The five-section I-PASS document for one patient.
//!
//! Every mutation authorizes the actor through [`PermissionGuard`] before touching state,
//! validates its input, and is rejected once the document is confirmed. Sync status is
//! tracked per section; callers mark a section edited after a mutation is applied and
//! report persistence results back through [`IPassDocument::complete_save`].

use crate::actions::{ActionItem, ActionRegistry, NewActionItem};
use crate::config::{ContingencyDeleteRule, SeedStrategy};
use crate::contingency::{
    ContingencyPlan, ContingencyRegistry, ContingencyStatus, NewContingencyPlan,
};
use crate::error::{HandoverError, SyncError};
use crate::permission::{CareTeam, PermissionGuard, WriterRole};
use crate::sync::{SaveTicket, SyncStatus, SyncStatusTracker};
use crate::HandoverResult;
use chrono::{DateTime, Utc};
use handover_ids::{ClinicianId, EntryId, PatientId};
use handover_roster::{Clinician, IllnessSeverity, Patient};
use handover_types::{NonEmptyText, ShiftTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The I-PASS sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    IllnessSeverity,
    PatientSummary,
    ActionList,
    SituationAwareness,
    Synthesis,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        SectionKind::IllnessSeverity,
        SectionKind::PatientSummary,
        SectionKind::ActionList,
        SectionKind::SituationAwareness,
        SectionKind::Synthesis,
    ];

    /// Who may mutate the section. Deleting action items is further restricted by
    /// [`PermissionGuard::can_delete_action_item`].
    pub fn writer_role(self) -> WriterRole {
        match self {
            Self::IllnessSeverity | Self::PatientSummary => WriterRole::AssignedPhysician,
            Self::ActionList | Self::SituationAwareness => WriterRole::AnyParticipant,
            Self::Synthesis => WriterRole::ReceivingPhysician,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IllnessSeverity => "illness_severity",
            Self::PatientSummary => "patient_summary",
            Self::ActionList => "action_list",
            Self::SituationAwareness => "situation_awareness",
            Self::Synthesis => "synthesis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a last-writer-wins edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    Applied,
    /// A newer edit is already in place; the submitted value was not applied.
    Superseded { current_edited_at: DateTime<Utc> },
}

/// A single-valued section with its edit metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section<T> {
    pub content: Option<T>,
    pub last_edited_by: Option<ClinicianId>,
    pub last_edited_at: Option<DateTime<Utc>>,
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Self {
            content: None,
            last_edited_by: None,
            last_edited_at: None,
        }
    }
}

impl<T> Section<T> {
    fn seeded(content: Option<T>) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }

    /// Applies `value` unless an edit stamped later than `at` is already in place.
    pub fn apply(&mut self, value: T, actor: ClinicianId, at: DateTime<Utc>) -> EditOutcome {
        if let Some(current) = self.last_edited_at {
            if at < current {
                return EditOutcome::Superseded {
                    current_edited_at: current,
                };
            }
        }
        self.content = Some(value);
        self.last_edited_by = Some(actor);
        self.last_edited_at = Some(at);
        EditOutcome::Applied
    }

    pub fn is_filled(&self) -> bool {
        self.content.is_some()
    }
}

/// A section's content as handed to the persistence collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "section", content = "content", rename_all = "snake_case")]
pub enum SectionContent {
    IllnessSeverity(Option<IllnessSeverity>),
    PatientSummary(Option<NonEmptyText>),
    ActionList(Vec<ActionItem>),
    SituationAwareness {
        narrative: Option<NonEmptyText>,
        contingencies: Vec<ContingencyPlan>,
    },
    Synthesis(Option<NonEmptyText>),
}

impl SectionContent {
    pub fn kind(&self) -> SectionKind {
        match self {
            Self::IllnessSeverity(_) => SectionKind::IllnessSeverity,
            Self::PatientSummary(_) => SectionKind::PatientSummary,
            Self::ActionList(_) => SectionKind::ActionList,
            Self::SituationAwareness { .. } => SectionKind::SituationAwareness,
            Self::Synthesis(_) => SectionKind::Synthesis,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    /// All five sections have content.
    UnderReview,
    /// Set only by finalization.
    Confirmed,
}

#[derive(Clone, Debug, Serialize)]
pub struct IPassDocument {
    patient_id: PatientId,
    team: CareTeam,
    shift: ShiftTag,
    illness_severity: Section<IllnessSeverity>,
    patient_summary: Section<NonEmptyText>,
    actions: ActionRegistry,
    situation_narrative: Section<NonEmptyText>,
    contingencies: ContingencyRegistry,
    synthesis: Section<NonEmptyText>,
    confirmed: bool,
    #[serde(skip)]
    trackers: BTreeMap<SectionKind, SyncStatusTracker>,
    #[serde(skip)]
    acknowledged: BTreeMap<SectionKind, SectionContent>,
}

impl IPassDocument {
    /// A fresh document for `patient` in the `shift` transition.
    pub fn new(patient: &Patient, shift: ShiftTag, seed: SeedStrategy) -> Self {
        let (severity, summary) = match seed {
            SeedStrategy::Empty => (None, None),
            SeedStrategy::FromPatient => {
                (Some(patient.illness_severity), patient.diagnosis.clone())
            }
        };

        Self {
            patient_id: patient.id,
            team: CareTeam::of(patient),
            shift,
            illness_severity: Section::seeded(severity),
            patient_summary: Section::seeded(summary),
            actions: ActionRegistry::new(),
            situation_narrative: Section::default(),
            contingencies: ContingencyRegistry::new(),
            synthesis: Section::default(),
            confirmed: false,
            trackers: SectionKind::ALL
                .into_iter()
                .map(|k| (k, SyncStatusTracker::new()))
                .collect(),
            acknowledged: BTreeMap::new(),
        }
    }

    /// A document for the next shift built from the previous shift's document.
    ///
    /// Open action items keep their original shift tag, contingency plans and free-text
    /// sections carry over, and the synthesis starts empty.
    pub fn carried_forward(patient: &Patient, previous: &IPassDocument, shift: ShiftTag) -> Self {
        let mut doc = Self::new(patient, shift, SeedStrategy::Empty);
        doc.illness_severity = previous.illness_severity.clone();
        doc.patient_summary = previous.patient_summary.clone();
        doc.situation_narrative = previous.situation_narrative.clone();
        doc.contingencies = previous.contingencies.clone();
        doc.actions = previous.actions.clone();
        doc.actions.retain(|item| !item.completed);
        doc
    }

    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    pub fn team(&self) -> CareTeam {
        self.team
    }

    pub fn shift(&self) -> ShiftTag {
        self.shift
    }

    pub fn illness_severity(&self) -> &Section<IllnessSeverity> {
        &self.illness_severity
    }

    pub fn patient_summary(&self) -> &Section<NonEmptyText> {
        &self.patient_summary
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn situation_narrative(&self) -> &Section<NonEmptyText> {
        &self.situation_narrative
    }

    pub fn contingencies(&self) -> &ContingencyRegistry {
        &self.contingencies
    }

    pub fn synthesis(&self) -> &Section<NonEmptyText> {
        &self.synthesis
    }

    /// Latest entry id held by either registry.
    pub fn latest_entry_id(&self) -> Option<EntryId> {
        self.actions.latest_id().max(self.contingencies.latest_id())
    }

    pub fn status(&self) -> DocumentStatus {
        if self.confirmed {
            return DocumentStatus::Confirmed;
        }
        let all_filled = self.illness_severity.is_filled()
            && self.patient_summary.is_filled()
            && !self.actions.is_empty()
            && (self.situation_narrative.is_filled() || !self.contingencies.is_empty())
            && self.synthesis.is_filled();
        if all_filled {
            DocumentStatus::UnderReview
        } else {
            DocumentStatus::Draft
        }
    }

    fn authorize(&self, section: SectionKind, actor: ClinicianId) -> HandoverResult<()> {
        PermissionGuard::authorize_section(section, actor, &self.team)?;
        if self.confirmed {
            return Err(HandoverError::AlreadyFinalized);
        }
        Ok(())
    }

    pub fn set_illness_severity(
        &mut self,
        actor: ClinicianId,
        severity: IllnessSeverity,
        at: DateTime<Utc>,
    ) -> HandoverResult<EditOutcome> {
        self.authorize(SectionKind::IllnessSeverity, actor)?;
        Ok(self.illness_severity.apply(severity, actor, at))
    }

    pub fn set_patient_summary(
        &mut self,
        actor: ClinicianId,
        text: &str,
        at: DateTime<Utc>,
    ) -> HandoverResult<EditOutcome> {
        self.authorize(SectionKind::PatientSummary, actor)?;
        let text = NonEmptyText::new(text).map_err(HandoverError::text("patient summary"))?;
        Ok(self.patient_summary.apply(text, actor, at))
    }

    pub fn set_situation_narrative(
        &mut self,
        actor: ClinicianId,
        text: &str,
        at: DateTime<Utc>,
    ) -> HandoverResult<EditOutcome> {
        self.authorize(SectionKind::SituationAwareness, actor)?;
        let text =
            NonEmptyText::new(text).map_err(HandoverError::text("situation narrative"))?;
        Ok(self.situation_narrative.apply(text, actor, at))
    }

    pub fn set_synthesis(
        &mut self,
        actor: ClinicianId,
        text: &str,
        at: DateTime<Utc>,
    ) -> HandoverResult<EditOutcome> {
        self.authorize(SectionKind::Synthesis, actor)?;
        let text = NonEmptyText::new(text).map_err(HandoverError::text("synthesis"))?;
        Ok(self.synthesis.apply(text, actor, at))
    }

    pub fn add_action(
        &mut self,
        actor: &Clinician,
        new: NewActionItem,
        id: EntryId,
    ) -> HandoverResult<EntryId> {
        self.authorize(SectionKind::ActionList, actor.id)?;
        self.actions.add(new, actor, id, self.shift)
    }

    pub fn toggle_action(
        &mut self,
        actor: ClinicianId,
        id: &EntryId,
        at: DateTime<Utc>,
    ) -> HandoverResult<bool> {
        self.authorize(SectionKind::ActionList, actor)?;
        self.actions.toggle_complete(id, actor, at)
    }

    pub fn delete_action(&mut self, actor: ClinicianId, id: &EntryId) -> HandoverResult<ActionItem> {
        self.authorize(SectionKind::ActionList, actor)?;
        self.actions
            .delete(id, actor, self.team.assigned_physician, self.shift)
    }

    pub fn add_contingency(
        &mut self,
        actor: &Clinician,
        new: NewContingencyPlan,
        id: EntryId,
    ) -> HandoverResult<EntryId> {
        self.authorize(SectionKind::SituationAwareness, actor.id)?;
        self.contingencies.add(new, actor, id, self.shift)
    }

    pub fn set_contingency_status(
        &mut self,
        actor: ClinicianId,
        id: &EntryId,
        status: ContingencyStatus,
    ) -> HandoverResult<bool> {
        self.authorize(SectionKind::SituationAwareness, actor)?;
        self.contingencies.set_status(id, status)
    }

    pub fn delete_contingency(
        &mut self,
        actor: ClinicianId,
        id: &EntryId,
        rule: ContingencyDeleteRule,
    ) -> HandoverResult<ContingencyPlan> {
        self.authorize(SectionKind::SituationAwareness, actor)?;
        self.contingencies
            .delete(id, actor, self.team.assigned_physician, self.shift, rule)
    }

    /// Current content of a section, as it would be persisted.
    pub fn snapshot(&self, kind: SectionKind) -> SectionContent {
        match kind {
            SectionKind::IllnessSeverity => {
                SectionContent::IllnessSeverity(self.illness_severity.content)
            }
            SectionKind::PatientSummary => {
                SectionContent::PatientSummary(self.patient_summary.content.clone())
            }
            SectionKind::ActionList => {
                SectionContent::ActionList(self.actions.iter().cloned().collect())
            }
            SectionKind::SituationAwareness => SectionContent::SituationAwareness {
                narrative: self.situation_narrative.content.clone(),
                contingencies: self.contingencies.iter().cloned().collect(),
            },
            SectionKind::Synthesis => SectionContent::Synthesis(self.synthesis.content.clone()),
        }
    }

    /// The content most recently acknowledged by persistence, if any.
    pub fn acknowledged(&self, kind: SectionKind) -> Option<&SectionContent> {
        self.acknowledged.get(&kind)
    }

    fn tracker_mut(&mut self, kind: SectionKind) -> &mut SyncStatusTracker {
        self.trackers.entry(kind).or_default()
    }

    /// Marks a section as edited; the ticket identifies the save that should follow.
    pub fn mark_edited(&mut self, kind: SectionKind) -> SaveTicket {
        self.tracker_mut(kind).on_edit()
    }

    pub fn should_persist(&self, kind: SectionKind, ticket: SaveTicket) -> bool {
        self.trackers
            .get(&kind)
            .is_some_and(|t| t.should_persist(ticket))
    }

    pub fn is_current(&self, kind: SectionKind, ticket: SaveTicket) -> bool {
        self.trackers.get(&kind).is_some_and(|t| t.is_current(ticket))
    }

    /// Records a persistence result. Content is remembered as acknowledged only if the
    /// result belongs to the latest edit and succeeded.
    pub fn complete_save(
        &mut self,
        kind: SectionKind,
        ticket: SaveTicket,
        result: Result<(), &SyncError>,
        content: SectionContent,
        at: DateTime<Utc>,
    ) -> bool {
        let succeeded = result.is_ok();
        let applied = self.tracker_mut(kind).on_persist_result(ticket, result, at);
        if applied && succeeded {
            self.acknowledged.insert(kind, content);
        }
        applied
    }

    pub fn sync_status(&self, kind: SectionKind) -> SyncStatus {
        self.trackers
            .get(&kind)
            .map_or(SyncStatus::Synced, SyncStatusTracker::status)
    }

    pub fn last_sync_error(&self, kind: SectionKind) -> Option<&str> {
        self.trackers.get(&kind).and_then(|t| t.last_error())
    }

    /// The least settled status across all sections.
    pub fn overall_sync_status(&self) -> SyncStatus {
        let rank = |s: SyncStatus| match s {
            SyncStatus::Synced => 0,
            SyncStatus::Pending => 1,
            SyncStatus::Offline => 2,
            SyncStatus::Error => 3,
        };
        SectionKind::ALL
            .into_iter()
            .map(|k| self.sync_status(k))
            .max_by_key(|s| rank(*s))
            .unwrap_or(SyncStatus::Synced)
    }

    /// Propagates a connectivity change to every section and returns retries to schedule.
    pub fn set_offline(&mut self, offline: bool) -> Vec<(SectionKind, SaveTicket)> {
        SectionKind::ALL
            .into_iter()
            .filter_map(|k| self.tracker_mut(k).set_offline(offline).map(|t| (k, t)))
            .collect()
    }

    pub(crate) fn mark_confirmed(&mut self) {
        self.confirmed = true;
    }
}
