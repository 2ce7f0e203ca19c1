//! Contingency plans: "if condition, then action" rules for anticipated deterioration.

use crate::actions::Priority;
use crate::config::ContingencyDeleteRule;
use crate::error::{HandoverError, PermissionError, ValidationError};
use crate::permission::PermissionGuard;
use crate::registry::{Registry, RegistryEntry};
use crate::HandoverResult;
use chrono::{DateTime, Utc};
use handover_ids::{ClinicianId, EntryId};
use handover_roster::Clinician;
use handover_types::{NonEmptyText, ShiftTag};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContingencyStatus {
    #[default]
    Active,
    Planned,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyPlan {
    pub id: EntryId,
    pub condition: NonEmptyText,
    pub action: NonEmptyText,
    pub priority: Priority,
    pub status: ContingencyStatus,
    pub submitted_by: Clinician,
    pub submitted_at: DateTime<Utc>,
    pub shift_tag: ShiftTag,
}

impl RegistryEntry for ContingencyPlan {
    fn id(&self) -> EntryId {
        self.id
    }

    fn group_rank(&self) -> u8 {
        match self.status {
            ContingencyStatus::Active => 0,
            ContingencyStatus::Planned => 1,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewContingencyPlan {
    pub condition: String,
    pub action: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: ContingencyStatus,
}

impl NewContingencyPlan {
    pub fn new(condition: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            action: action.into(),
            ..Self::default()
        }
    }
}

pub type ContingencyRegistry = Registry<ContingencyPlan>;

impl Registry<ContingencyPlan> {
    /// Both the condition and the action must be non-empty.
    pub fn add(
        &mut self,
        new: NewContingencyPlan,
        submitted_by: &Clinician,
        id: EntryId,
        shift_tag: ShiftTag,
    ) -> HandoverResult<EntryId> {
        let condition =
            NonEmptyText::new(&new.condition).map_err(HandoverError::text("condition"))?;
        let action = NonEmptyText::new(&new.action).map_err(HandoverError::text("action"))?;

        self.insert(ContingencyPlan {
            id,
            condition,
            action,
            priority: new.priority,
            status: new.status,
            submitted_by: submitted_by.clone(),
            submitted_at: id.timestamp(),
            shift_tag,
        });
        Ok(id)
    }

    /// Returns `true` if the status changed.
    pub fn set_status(&mut self, id: &EntryId, status: ContingencyStatus) -> HandoverResult<bool> {
        let plan = self
            .get_mut(id)
            .ok_or(ValidationError::UnknownEntry(*id))?;
        let changed = plan.status != status;
        plan.status = status;
        Ok(changed)
    }

    pub fn delete(
        &mut self,
        id: &EntryId,
        actor: ClinicianId,
        assigned_physician: ClinicianId,
        current_shift: ShiftTag,
        rule: ContingencyDeleteRule,
    ) -> HandoverResult<ContingencyPlan> {
        let plan = self.get(id).ok_or(ValidationError::UnknownEntry(*id))?;

        if !PermissionGuard::can_delete_contingency(
            actor,
            plan,
            assigned_physician,
            current_shift,
            rule,
        ) {
            tracing::warn!(%actor, entry = %id, ?rule, "contingency plan delete denied");
            return Err(PermissionError::ContingencyDeleteDenied(*id).into());
        }

        self.remove(id)
            .ok_or_else(|| ValidationError::UnknownEntry(*id).into())
    }
}
