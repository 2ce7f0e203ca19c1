//! Roster wire model and translation helpers.
//!
//! A roster is the YAML document an outer layer hands to the handover core to describe
//! who is on the ward list for this shift:
//!
//! ```yaml
//! staff:
//!   - id: 8c7e0a3b5f8d4c2a9e1f0b6d4a2c8e11
//!     name: Nurse Okafor
//!     role: nurse
//! patients:
//!   - id: 550e8400e29b41d4a716446655440000
//!     name: Maria Rodriguez
//!     room: PICU-01
//!     mrn: MRN-004512
//!     illness_severity: watcher
//!     assigned_physician: { id: ..., name: Dr. Johnson, role: physician }
//!     receiving_physician: { id: ..., name: Dr. Patel, role: physician }
//!     alerts: []
//! ```
//!
//! Parsing is strict: unknown keys are rejected and schema errors name the failing field.

use crate::{
    Alert, AlertLevel, AlertStatus, ClinicalRole, Clinician, IllnessSeverity, Patient,
    RosterError, RosterResult,
};
use chrono::{DateTime, Utc};
use handover_ids::{ClinicianId, PatientId};
use handover_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Public domain-level types
// ============================================================================

/// Parsed, validated roster contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RosterData {
    pub patients: Vec<Patient>,
    /// Participants who are not necessarily attached to a patient (nurses, pharmacists).
    pub staff: Vec<Clinician>,
}

impl RosterData {
    pub fn patient(&self, id: &PatientId) -> Option<&Patient> {
        self.patients.iter().find(|p| &p.id == id)
    }

    /// Looks a participant up by id across the staff list and every patient's physicians.
    pub fn clinician(&self, id: &ClinicianId) -> Option<&Clinician> {
        self.staff.iter().find(|c| &c.id == id).or_else(|| {
            self.patients.iter().find_map(|p| {
                [&p.assigned_physician, &p.receiving_physician]
                    .into_iter()
                    .find(|c| &c.id == id)
            })
        })
    }
}

// ============================================================================
// Public Roster operations
// ============================================================================

/// Roster operations.
///
/// Zero-sized namespace; all methods are associated functions.
pub struct Roster;

impl Roster {
    /// Parse a roster from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Translation`] when the YAML does not match the wire schema
    /// (the message names the failing field), [`RosterError::InvalidId`] for
    /// non-canonical identifiers, and [`RosterError::InvalidInput`] when the roster is
    /// internally inconsistent (duplicate patients, a patient handed over to the same
    /// clinician who assigned it).
    pub fn parse(yaml_text: &str) -> RosterResult<RosterData> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, RosterWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(RosterError::Translation(format!(
                    "roster schema mismatch at {path}: {source}"
                )));
            }
        };

        let data = wire_to_domain(wire)?;
        validate(&data)?;
        Ok(data)
    }

    /// Render a roster as YAML text.
    pub fn render(data: &RosterData) -> RosterResult<String> {
        serde_yaml::to_string(&domain_to_wire(data))
            .map_err(|e| RosterError::Translation(format!("failed to serialize roster: {e}")))
    }

    /// Read and parse a roster file.
    pub fn load(path: &Path) -> RosterResult<RosterData> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

fn validate(data: &RosterData) -> RosterResult<()> {
    let mut seen = HashSet::new();
    for patient in &data.patients {
        if !seen.insert(patient.id) {
            return Err(RosterError::InvalidInput(format!(
                "duplicate patient id {}",
                patient.id
            )));
        }
        if patient.assigned_physician.id == patient.receiving_physician.id {
            return Err(RosterError::InvalidInput(format!(
                "patient {} has the same assigned and receiving physician",
                patient.id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RosterWire {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    staff: Vec<ClinicianWire>,
    patients: Vec<PatientWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ClinicianWire {
    id: String,
    name: String,
    role: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct PatientWire {
    id: String,
    name: String,
    room: String,
    mrn: String,
    illness_severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    diagnosis: Option<String>,
    assigned_physician: ClinicianWire,
    receiving_physician: ClinicianWire,
    #[serde(default)]
    alerts: Vec<AlertWire>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct AlertWire {
    level: String,
    status: String,
    description: String,
    created_by: String,
    created_at: DateTime<Utc>,
    source: String,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn text(field: &str, value: &str) -> RosterResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|e| RosterError::Translation(format!("{field}: {e}")))
}

fn clinician_from_wire(field: &str, wire: ClinicianWire) -> RosterResult<Clinician> {
    let id = ClinicianId::parse(&wire.id)
        .map_err(|e| RosterError::InvalidId(format!("{field}.id: {e}")))?;
    Ok(Clinician {
        id,
        name: text(&format!("{field}.name"), &wire.name)?,
        role: ClinicalRole::parse(&wire.role)?,
    })
}

fn alert_from_wire(field: &str, wire: AlertWire) -> RosterResult<Alert> {
    Ok(Alert {
        level: AlertLevel::parse(&wire.level)?,
        status: AlertStatus::parse(&wire.status)?,
        description: text(&format!("{field}.description"), &wire.description)?,
        created_by: text(&format!("{field}.created_by"), &wire.created_by)?,
        created_at: wire.created_at,
        source: text(&format!("{field}.source"), &wire.source)?,
    })
}

fn patient_from_wire(index: usize, wire: PatientWire) -> RosterResult<Patient> {
    let field = format!("patients[{index}]");
    let id = PatientId::parse(&wire.id)
        .map_err(|e| RosterError::InvalidId(format!("{field}.id: {e}")))?;

    let diagnosis = wire
        .diagnosis
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| text(&format!("{field}.diagnosis"), d))
        .transpose()?;

    let alerts = wire
        .alerts
        .into_iter()
        .enumerate()
        .map(|(i, a)| alert_from_wire(&format!("{field}.alerts[{i}]"), a))
        .collect::<RosterResult<Vec<_>>>()?;

    Ok(Patient {
        id,
        name: text(&format!("{field}.name"), &wire.name)?,
        room: text(&format!("{field}.room"), &wire.room)?,
        mrn: text(&format!("{field}.mrn"), &wire.mrn)?,
        illness_severity: IllnessSeverity::parse(&wire.illness_severity)?,
        diagnosis,
        assigned_physician: clinician_from_wire(
            &format!("{field}.assigned_physician"),
            wire.assigned_physician,
        )?,
        receiving_physician: clinician_from_wire(
            &format!("{field}.receiving_physician"),
            wire.receiving_physician,
        )?,
        alerts,
    })
}

fn wire_to_domain(wire: RosterWire) -> RosterResult<RosterData> {
    let staff = wire
        .staff
        .into_iter()
        .enumerate()
        .map(|(i, c)| clinician_from_wire(&format!("staff[{i}]"), c))
        .collect::<RosterResult<Vec<_>>>()?;

    let patients = wire
        .patients
        .into_iter()
        .enumerate()
        .map(|(i, p)| patient_from_wire(i, p))
        .collect::<RosterResult<Vec<_>>>()?;

    Ok(RosterData { patients, staff })
}

fn clinician_to_wire(c: &Clinician) -> ClinicianWire {
    ClinicianWire {
        id: c.id.to_string(),
        name: c.name.to_string(),
        role: c.role.as_str().to_string(),
    }
}

fn domain_to_wire(data: &RosterData) -> RosterWire {
    RosterWire {
        staff: data.staff.iter().map(clinician_to_wire).collect(),
        patients: data
            .patients
            .iter()
            .map(|p| PatientWire {
                id: p.id.to_string(),
                name: p.name.to_string(),
                room: p.room.to_string(),
                mrn: p.mrn.to_string(),
                illness_severity: p.illness_severity.as_str().to_string(),
                diagnosis: p.diagnosis.as_ref().map(|d| d.to_string()),
                assigned_physician: clinician_to_wire(&p.assigned_physician),
                receiving_physician: clinician_to_wire(&p.receiving_physician),
                alerts: p
                    .alerts
                    .iter()
                    .map(|a| AlertWire {
                        level: format!("{:?}", a.level).to_uppercase(),
                        status: format!("{:?}", a.status).to_uppercase(),
                        description: a.description.to_string(),
                        created_by: a.created_by.to_string(),
                        created_at: a.created_at,
                        source: a.source.to_string(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"staff:
  - id: 8c7e0a3b5f8d4c2a9e1f0b6d4a2c8e11
    name: Nurse Okafor
    role: nurse
patients:
  - id: 550e8400e29b41d4a716446655440000
    name: Maria Rodriguez
    room: PICU-01
    mrn: MRN-004512
    illness_severity: guarded
    diagnosis: Septic shock
    assigned_physician:
      id: 1f0e2d3c4b5a69788796a5b4c3d2e1f0
      name: Dr. Johnson
      role: physician
    receiving_physician:
      id: 0a1b2c3d4e5f60718293a4b5c6d7e8f9
      name: Dr. Patel
      role: physician
    alerts:
      - level: HIGH
        status: ACTIVE
        description: Penicillin allergy
        created_by: Pharmacy
        created_at: 2026-01-10T08:00:00Z
        source: EHR
      - level: MEDIUM
        status: RESOLVED
        description: Fall risk
        created_by: Nurse Okafor
        created_at: 2026-01-09T08:00:00Z
        source: Nursing
"#;

    #[test]
    fn parses_sample_roster() {
        let data = Roster::parse(SAMPLE).expect("parse roster");
        assert_eq!(data.patients.len(), 1);
        let maria = &data.patients[0];
        assert_eq!(maria.name, "Maria Rodriguez");
        assert_eq!(maria.illness_severity, IllnessSeverity::Watcher);
        assert_eq!(maria.assigned_physician.name, "Dr. Johnson");
        assert_eq!(maria.active_alerts().len(), 1);
        assert_eq!(data.staff[0].role, ClinicalRole::Nurse);
    }

    #[test]
    fn render_then_parse_preserves_data() {
        let data = Roster::parse(SAMPLE).unwrap();
        let yaml = Roster::render(&data).unwrap();
        assert_eq!(Roster::parse(&yaml).unwrap(), data);
    }

    #[test]
    fn clinician_lookup_covers_staff_and_physicians() {
        let data = Roster::parse(SAMPLE).unwrap();
        let patel = ClinicianId::parse("0a1b2c3d4e5f60718293a4b5c6d7e8f9").unwrap();
        let okafor = ClinicianId::parse("8c7e0a3b5f8d4c2a9e1f0b6d4a2c8e11").unwrap();
        assert_eq!(data.clinician(&patel).unwrap().name, "Dr. Patel");
        assert_eq!(data.clinician(&okafor).unwrap().name, "Nurse Okafor");
        assert!(data.clinician(&ClinicianId::new()).is_none());
    }

    #[test]
    fn rejects_unknown_keys_with_path() {
        let input = SAMPLE.replace("    room: PICU-01\n", "    room: PICU-01\n    bed: 4\n");
        match Roster::parse(&input).expect_err("unknown key") {
            RosterError::Translation(msg) => {
                assert!(msg.contains("patients[0]"), "{msg}");
                assert!(msg.contains("bed"), "{msg}");
            }
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_hyphenated_ids() {
        let input = SAMPLE.replace(
            "id: 550e8400e29b41d4a716446655440000",
            "id: 550e8400-e29b-41d4-a716-446655440000",
        );
        match Roster::parse(&input).expect_err("hyphenated id") {
            RosterError::InvalidId(msg) => assert!(msg.contains("patients[0].id")),
            other => panic!("expected InvalidId error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_blank_names() {
        let input = SAMPLE.replace("name: Maria Rodriguez", "name: \"  \"");
        assert!(matches!(
            Roster::parse(&input),
            Err(RosterError::Translation(msg)) if msg.contains("patients[0].name")
        ));
    }

    #[test]
    fn rejects_self_handover() {
        let input = SAMPLE.replace(
            "0a1b2c3d4e5f60718293a4b5c6d7e8f9",
            "1f0e2d3c4b5a69788796a5b4c3d2e1f0",
        );
        assert!(matches!(
            Roster::parse(&input),
            Err(RosterError::InvalidInput(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let data = Roster::load(file.path()).unwrap();
        assert_eq!(data.patients[0].room, "PICU-01");
    }
}
