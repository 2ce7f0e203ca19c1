//! Patient data served from a parsed roster.

use crate::collaborators::PatientDataProvider;
use handover_ids::{ClinicianId, PatientId};
use handover_roster::{Alert, Clinician, Patient, Roster, RosterData, RosterError, RosterResult};
use std::path::Path;

/// A [`PatientDataProvider`] over a fixed roster, typically loaded at startup.
#[derive(Clone, Debug)]
pub struct StaticRoster {
    data: RosterData,
}

impl StaticRoster {
    pub fn new(data: RosterData) -> Self {
        Self { data }
    }

    pub fn parse(yaml_text: &str) -> RosterResult<Self> {
        Roster::parse(yaml_text).map(Self::new)
    }

    pub fn load(path: &Path) -> RosterResult<Self> {
        let roster = Roster::load(path).map(Self::new)?;
        tracing::info!(
            path = %path.display(),
            patients = roster.data.patients.len(),
            staff = roster.data.staff.len(),
            "roster loaded"
        );
        Ok(roster)
    }

    /// Resolves a participant by id, e.g. the actor named on an incoming request.
    pub fn clinician(&self, id: &ClinicianId) -> Option<&Clinician> {
        self.data.clinician(id)
    }

    pub fn data(&self) -> &RosterData {
        &self.data
    }
}

impl PatientDataProvider for StaticRoster {
    fn get_patients(&self) -> RosterResult<Vec<Patient>> {
        Ok(self.data.patients.clone())
    }

    fn get_alerts(&self, patient: &PatientId) -> RosterResult<Vec<Alert>> {
        self.data
            .patient(patient)
            .map(Patient::active_alerts)
            .ok_or_else(|| RosterError::InvalidInput(format!("unknown patient {patient}")))
    }
}
