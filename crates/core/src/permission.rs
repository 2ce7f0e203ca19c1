//! Authorization predicates for handover mutations.
//!
//! Every predicate compares stable [`ClinicianId`]s, never display names. The predicates
//! are pure and are evaluated on each mutation attempt; nothing here is cached.

use crate::actions::ActionItem;
use crate::config::ContingencyDeleteRule;
use crate::contingency::ContingencyPlan;
use crate::document::SectionKind;
use crate::error::PermissionError;
use handover_ids::ClinicianId;
use handover_roster::Patient;
use handover_types::ShiftTag;

/// Who may mutate a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterRole {
    AssignedPhysician,
    AnyParticipant,
    ReceivingPhysician,
}

/// The two identities a handover's permissions are bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CareTeam {
    pub assigned_physician: ClinicianId,
    pub receiving_physician: ClinicianId,
}

impl CareTeam {
    pub fn of(patient: &Patient) -> Self {
        Self {
            assigned_physician: patient.assigned_physician.id,
            receiving_physician: patient.receiving_physician.id,
        }
    }
}

/// Zero-sized namespace for the authorization rules.
pub struct PermissionGuard;

impl PermissionGuard {
    pub fn can_edit_clinical_section(actor: ClinicianId, assigned_physician: ClinicianId) -> bool {
        actor == assigned_physician
    }

    /// Situation awareness is an open collaboration section.
    pub fn can_edit_situation_awareness(_actor: ClinicianId) -> bool {
        true
    }

    pub fn can_confirm_synthesis(actor: ClinicianId, receiving_physician: ClinicianId) -> bool {
        actor == receiving_physician
    }

    /// Only the assigned physician may delete, only during the shift transition that created
    /// the item, and only while it is still open.
    pub fn can_delete_action_item(
        actor: ClinicianId,
        item: &ActionItem,
        assigned_physician: ClinicianId,
        current_shift: ShiftTag,
    ) -> bool {
        actor == assigned_physician && item.shift_tag == current_shift && !item.completed
    }

    pub fn can_delete_contingency(
        actor: ClinicianId,
        plan: &ContingencyPlan,
        assigned_physician: ClinicianId,
        current_shift: ShiftTag,
        rule: ContingencyDeleteRule,
    ) -> bool {
        if actor != assigned_physician {
            return false;
        }
        match rule {
            ContingencyDeleteRule::AssignedPhysician => true,
            ContingencyDeleteRule::AssignedPhysicianCurrentShift => {
                plan.shift_tag == current_shift
            }
        }
    }

    /// Whether `actor` may write a section with the given writer role.
    pub fn can_write(role: WriterRole, actor: ClinicianId, team: &CareTeam) -> bool {
        match role {
            WriterRole::AssignedPhysician => {
                Self::can_edit_clinical_section(actor, team.assigned_physician)
            }
            WriterRole::AnyParticipant => Self::can_edit_situation_awareness(actor),
            WriterRole::ReceivingPhysician => {
                Self::can_confirm_synthesis(actor, team.receiving_physician)
            }
        }
    }

    /// Fails closed with a [`PermissionError`] when `actor` may not write `section`.
    pub fn authorize_section(
        section: SectionKind,
        actor: ClinicianId,
        team: &CareTeam,
    ) -> Result<(), PermissionError> {
        let role = section.writer_role();
        if Self::can_write(role, actor, team) {
            return Ok(());
        }

        tracing::warn!(%actor, %section, "section edit denied");
        Err(match role {
            WriterRole::ReceivingPhysician => PermissionError::NotReceivingPhysician {
                action: "write the synthesis",
            },
            _ => PermissionError::NotAssignedPhysician { section },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Priority;
    use crate::contingency::ContingencyStatus;
    use handover_ids::EntryIdGenerator;
    use handover_roster::{ClinicalRole, Clinician};
    use handover_types::NonEmptyText;

    fn clinician(name: &str) -> Clinician {
        Clinician::new(
            ClinicianId::new(),
            NonEmptyText::new(name).unwrap(),
            ClinicalRole::Physician,
        )
    }

    fn action(owner: &Clinician, shift: &str, completed: bool) -> ActionItem {
        let mut ids = EntryIdGenerator::new();
        let id = ids.next_id();
        ActionItem {
            id,
            task: NonEmptyText::new("Follow up on blood culture").unwrap(),
            priority: Priority::High,
            due_time: None,
            completed,
            completed_by: None,
            completed_at: None,
            submitted_by: owner.clone(),
            submitted_at: id.timestamp(),
            shift_tag: shift.parse().unwrap(),
        }
    }

    fn plan(owner: &Clinician, shift: &str) -> ContingencyPlan {
        let mut ids = EntryIdGenerator::new();
        let id = ids.next_id();
        ContingencyPlan {
            id,
            condition: NonEmptyText::new("If MAP < 65").unwrap(),
            action: NonEmptyText::new("Start fluid bolus").unwrap(),
            priority: Priority::High,
            status: ContingencyStatus::Active,
            submitted_by: owner.clone(),
            submitted_at: id.timestamp(),
            shift_tag: shift.parse().unwrap(),
        }
    }

    #[test]
    fn clinical_sections_need_the_assigned_physician() {
        let johnson = clinician("Dr. Johnson");
        let patel = clinician("Dr. Patel");
        assert!(PermissionGuard::can_edit_clinical_section(
            johnson.id, johnson.id
        ));
        assert!(!PermissionGuard::can_edit_clinical_section(
            patel.id, johnson.id
        ));
    }

    #[test]
    fn identical_names_do_not_share_identity() {
        let a = clinician("Dr. Smith");
        let b = clinician("Dr. Smith");
        let team = CareTeam {
            assigned_physician: a.id,
            receiving_physician: a.id,
        };
        assert!(PermissionGuard::authorize_section(SectionKind::IllnessSeverity, b.id, &team)
            .is_err());
    }

    #[test]
    fn writer_roles_map_to_predicates() {
        let assigned = clinician("Dr. Johnson");
        let receiving = clinician("Dr. Patel");
        let nurse = clinician("Nurse Kim");
        let team = CareTeam {
            assigned_physician: assigned.id,
            receiving_physician: receiving.id,
        };

        assert!(PermissionGuard::authorize_section(
            SectionKind::SituationAwareness,
            nurse.id,
            &team
        )
        .is_ok());
        assert!(PermissionGuard::authorize_section(SectionKind::ActionList, nurse.id, &team).is_ok());
        assert_eq!(
            PermissionGuard::authorize_section(SectionKind::PatientSummary, receiving.id, &team),
            Err(PermissionError::NotAssignedPhysician {
                section: SectionKind::PatientSummary
            })
        );
        assert!(matches!(
            PermissionGuard::authorize_section(SectionKind::Synthesis, assigned.id, &team),
            Err(PermissionError::NotReceivingPhysician { .. })
        ));
        assert!(
            PermissionGuard::authorize_section(SectionKind::Synthesis, receiving.id, &team).is_ok()
        );
    }

    #[test]
    fn action_delete_is_scoped_to_owner_shift_and_open_items() {
        let johnson = clinician("Dr. Johnson");
        let nurse = clinician("Nurse Kim");
        let night_day: ShiftTag = "Night→Day".parse().unwrap();
        let day_evening: ShiftTag = "Day→Evening".parse().unwrap();

        let open = action(&johnson, "Night→Day", false);
        assert!(PermissionGuard::can_delete_action_item(
            johnson.id, &open, johnson.id, night_day
        ));
        assert!(!PermissionGuard::can_delete_action_item(
            johnson.id,
            &open,
            johnson.id,
            day_evening
        ));
        assert!(!PermissionGuard::can_delete_action_item(
            nurse.id, &open, johnson.id, night_day
        ));

        let done = action(&johnson, "Night→Day", true);
        assert!(!PermissionGuard::can_delete_action_item(
            johnson.id, &done, johnson.id, night_day
        ));
    }

    #[test]
    fn contingency_delete_follows_the_configured_rule() {
        let johnson = clinician("Dr. Johnson");
        let nurse = clinician("Nurse Kim");
        let old = plan(&johnson, "Night→Day");
        let now: ShiftTag = "Day→Evening".parse().unwrap();

        assert!(PermissionGuard::can_delete_contingency(
            johnson.id,
            &old,
            johnson.id,
            now,
            ContingencyDeleteRule::AssignedPhysician
        ));
        assert!(!PermissionGuard::can_delete_contingency(
            johnson.id,
            &old,
            johnson.id,
            now,
            ContingencyDeleteRule::AssignedPhysicianCurrentShift
        ));
        assert!(!PermissionGuard::can_delete_contingency(
            nurse.id,
            &old,
            johnson.id,
            now,
            ContingencyDeleteRule::AssignedPhysician
        ));
    }
}
