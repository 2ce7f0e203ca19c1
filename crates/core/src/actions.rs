//! Action items: tasks handed from one shift to the next.

use crate::error::{HandoverError, PermissionError, ValidationError};
use crate::permission::PermissionGuard;
use crate::registry::{Registry, RegistryEntry};
use crate::HandoverResult;
use chrono::{DateTime, NaiveTime, Utc};
use handover_ids::{ClinicianId, EntryId};
use handover_roster::Clinician;
use handover_types::{NonEmptyText, ShiftTag};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: EntryId,
    pub task: NonEmptyText,
    pub priority: Priority,
    pub due_time: Option<NaiveTime>,
    pub completed: bool,
    pub completed_by: Option<ClinicianId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub submitted_by: Clinician,
    pub submitted_at: DateTime<Utc>,
    /// The shift transition during which the item was created.
    pub shift_tag: ShiftTag,
}

impl RegistryEntry for ActionItem {
    fn id(&self) -> EntryId {
        self.id
    }

    fn group_rank(&self) -> u8 {
        u8::from(self.completed)
    }
}

/// Caller-supplied fields of a new action item. Id, timestamps and shift are assigned
/// by the server.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewActionItem {
    pub task: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_time: Option<NaiveTime>,
}

impl NewActionItem {
    pub fn new(task: impl Into<String>, priority: Priority) -> Self {
        Self {
            task: task.into(),
            priority,
            due_time: None,
        }
    }
}

pub type ActionRegistry = Registry<ActionItem>;

impl Registry<ActionItem> {
    /// Validates and appends a new item under a server-assigned id.
    pub fn add(
        &mut self,
        new: NewActionItem,
        submitted_by: &Clinician,
        id: EntryId,
        shift_tag: ShiftTag,
    ) -> HandoverResult<EntryId> {
        let task = NonEmptyText::new(&new.task).map_err(HandoverError::text("task"))?;

        self.insert(ActionItem {
            id,
            task,
            priority: new.priority,
            due_time: new.due_time,
            completed: false,
            completed_by: None,
            completed_at: None,
            submitted_by: submitted_by.clone(),
            submitted_at: id.timestamp(),
            shift_tag,
        });
        Ok(id)
    }

    /// Flips completion. Any participant may do this. Returns the new `completed` value.
    pub fn toggle_complete(
        &mut self,
        id: &EntryId,
        actor: ClinicianId,
        at: DateTime<Utc>,
    ) -> HandoverResult<bool> {
        let item = self
            .get_mut(id)
            .ok_or(ValidationError::UnknownEntry(*id))?;

        item.completed = !item.completed;
        if item.completed {
            item.completed_by = Some(actor);
            item.completed_at = Some(at);
        } else {
            item.completed_by = None;
            item.completed_at = None;
        }
        Ok(item.completed)
    }

    /// Removes an item if [`PermissionGuard::can_delete_action_item`] allows it.
    pub fn delete(
        &mut self,
        id: &EntryId,
        actor: ClinicianId,
        assigned_physician: ClinicianId,
        current_shift: ShiftTag,
    ) -> HandoverResult<ActionItem> {
        let item = self.get(id).ok_or(ValidationError::UnknownEntry(*id))?;

        if !PermissionGuard::can_delete_action_item(actor, item, assigned_physician, current_shift)
        {
            tracing::warn!(%actor, entry = %id, %current_shift, "action item delete denied");
            return Err(PermissionError::ActionDeleteDenied(*id).into());
        }

        self.remove(id)
            .ok_or_else(|| ValidationError::UnknownEntry(*id).into())
    }

    /// Items still open, used when carrying the list into the next shift.
    pub fn incomplete(&self) -> impl Iterator<Item = &ActionItem> {
        self.iter().filter(|i| !i.completed)
    }
}
