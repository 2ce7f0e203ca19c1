//! Care-team participants.

use crate::RosterError;
use handover_ids::ClinicianId;
use handover_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// A participant in a handover: physician, nurse or other team member.
///
/// `id` is the only field that carries identity. `name` is for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clinician {
    pub id: ClinicianId,
    pub name: NonEmptyText,
    pub role: ClinicalRole,
}

impl Clinician {
    pub fn new(id: ClinicianId, name: NonEmptyText, role: ClinicalRole) -> Self {
        Self { id, name, role }
    }
}

/// Professional role of a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalRole {
    Physician,
    Resident,
    Nurse,
    Pharmacist,
    Other,
}

impl ClinicalRole {
    /// Parses a role from its string representation (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, RosterError> {
        match s.trim().to_lowercase().as_str() {
            "physician" => Ok(Self::Physician),
            "resident" => Ok(Self::Resident),
            "nurse" => Ok(Self::Nurse),
            "pharmacist" => Ok(Self::Pharmacist),
            "other" => Ok(Self::Other),
            _ => Err(RosterError::InvalidInput(format!("invalid role: {s}"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Physician => "physician",
            Self::Resident => "resident",
            Self::Nurse => "nurse",
            Self::Pharmacist => "pharmacist",
            Self::Other => "other",
        }
    }
}
