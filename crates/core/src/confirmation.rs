//! The receiving physician's confirmation checklist.
//!
//! Finalization is terminal: once a gate is finalized every further `check` or `finalize`
//! fails with [`HandoverError::AlreadyFinalized`] and the gate never un-confirms.
//!
//! Finalizing through an external record is two-phase. [`ConfirmationGate::begin_finalize`]
//! reserves the gate, freezing the checklist, and the reservation ends with either
//! [`ConfirmationGate::commit_finalize`] or [`ConfirmationGate::abort_finalize`].

use crate::config::ChecklistTemplateItem;
use crate::error::{HandoverError, PermissionError, ValidationError};
use crate::permission::PermissionGuard;
use crate::HandoverResult;
use chrono::{DateTime, Utc};
use handover_ids::ClinicianId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub label: String,
    pub required: bool,
    /// Critical items cannot be unchecked once checked.
    pub critical: bool,
    pub checked: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalization {
    pub finalized_by: ClinicianId,
    pub finalized_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfirmationGate {
    receiving_physician: ClinicianId,
    items: Vec<ChecklistItem>,
    finalized: Option<Finalization>,
    #[serde(skip)]
    finalizing: Option<ClinicianId>,
}

impl ConfirmationGate {
    pub fn new(receiving_physician: ClinicianId, template: &[ChecklistTemplateItem]) -> Self {
        let items = template
            .iter()
            .map(|t| ChecklistItem {
                id: t.id.clone(),
                label: t.label.clone(),
                required: t.required,
                critical: t.critical,
                checked: false,
                checked_at: None,
            })
            .collect();

        Self {
            receiving_physician,
            items,
            finalized: None,
            finalizing: None,
        }
    }

    pub fn receiving_physician(&self) -> ClinicianId {
        self.receiving_physician
    }

    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    pub fn finalization(&self) -> Option<&Finalization> {
        self.finalized.as_ref()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    /// True while a finalization is reserved but not yet committed or aborted.
    pub fn is_finalizing(&self) -> bool {
        self.finalizing.is_some()
    }

    fn authorize(&self, actor: ClinicianId, action: &'static str) -> HandoverResult<()> {
        if PermissionGuard::can_confirm_synthesis(actor, self.receiving_physician) {
            return Ok(());
        }
        tracing::warn!(%actor, action, "confirmation denied");
        Err(PermissionError::NotReceivingPhysician { action }.into())
    }

    /// Sets one checklist item.
    pub fn check(
        &mut self,
        item_id: &str,
        checked: bool,
        actor: ClinicianId,
        at: DateTime<Utc>,
    ) -> HandoverResult<()> {
        self.authorize(actor, "check confirmation items")?;
        if self.is_finalized() {
            return Err(HandoverError::AlreadyFinalized);
        }
        if self.is_finalizing() {
            return Err(HandoverError::FinalizeInProgress);
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| ValidationError::UnknownChecklistItem(item_id.to_string()))?;

        if item.critical && item.checked && !checked {
            return Err(ValidationError::IrrevocableItem(item.id.clone()).into());
        }

        item.checked = checked;
        item.checked_at = checked.then_some(at);
        Ok(())
    }

    /// Number of required items still unchecked.
    pub fn missing_required(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.required && !i.checked)
            .count()
    }

    /// True iff every required item is checked. Optional items do not count.
    pub fn is_ready(&self) -> bool {
        self.missing_required() == 0
    }

    /// Runs every finalize precondition without changing state.
    pub fn ensure_can_finalize(&self, actor: ClinicianId) -> HandoverResult<()> {
        self.authorize(actor, "finalize the handover")?;
        if self.is_finalized() {
            return Err(HandoverError::AlreadyFinalized);
        }
        let missing = self.missing_required();
        if missing > 0 {
            return Err(HandoverError::NotReady { missing });
        }
        Ok(())
    }

    /// Reserves the gate for `actor`. Checklist changes and other finalizations are refused
    /// until the reservation is committed or aborted.
    pub fn begin_finalize(&mut self, actor: ClinicianId) -> HandoverResult<()> {
        self.ensure_can_finalize(actor)?;
        if self.is_finalizing() {
            return Err(HandoverError::FinalizeInProgress);
        }
        self.finalizing = Some(actor);
        Ok(())
    }

    /// Closes the gate on a reservation held by `actor`.
    pub fn commit_finalize(
        &mut self,
        actor: ClinicianId,
        at: DateTime<Utc>,
    ) -> HandoverResult<Finalization> {
        self.ensure_can_finalize(actor)?;
        if self.finalizing != Some(actor) {
            return Err(ValidationError::Invalid(format!(
                "no finalization reserved for {actor}"
            ))
            .into());
        }
        let finalization = Finalization {
            finalized_by: actor,
            finalized_at: at,
        };
        self.finalized = Some(finalization);
        self.finalizing = None;
        Ok(finalization)
    }

    /// Releases a reservation held by `actor`; the checklist becomes editable again.
    pub fn abort_finalize(&mut self, actor: ClinicianId) {
        if self.finalizing == Some(actor) {
            self.finalizing = None;
        }
    }

    /// Reserves and commits in one step, for callers with no external record to write.
    pub fn finalize(&mut self, actor: ClinicianId, at: DateTime<Utc>) -> HandoverResult<Finalization> {
        self.begin_finalize(actor)?;
        self.commit_finalize(actor, at)
    }
}
