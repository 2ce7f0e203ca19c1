//! Patient records and alerts as seen by the handover core.

use crate::{Clinician, RosterError};
use chrono::{DateTime, Utc};
use handover_ids::PatientId;
use handover_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// A patient on the handover list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: NonEmptyText,
    pub room: NonEmptyText,
    pub mrn: NonEmptyText,
    pub illness_severity: IllnessSeverity,
    /// Working diagnosis, if recorded.
    pub diagnosis: Option<NonEmptyText>,
    /// Clinician responsible for the record during the outgoing shift.
    pub assigned_physician: Clinician,
    /// Incoming clinician who reviews and accepts the handover.
    pub receiving_physician: Clinician,
    pub alerts: Vec<Alert>,
}

impl Patient {
    /// Active alerts, highest level first and newest first within a level.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| {
            a.level
                .rank()
                .cmp(&b.level.rank())
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        alerts
    }
}

/// I-PASS illness severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IllnessSeverity {
    Stable,
    /// Also known as "guarded".
    #[serde(alias = "guarded")]
    Watcher,
    Unstable,
    Critical,
}

impl IllnessSeverity {
    /// Parses a severity from its string representation (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, RosterError> {
        match s.trim().to_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "watcher" | "guarded" => Ok(Self::Watcher),
            "unstable" => Ok(Self::Unstable),
            "critical" => Ok(Self::Critical),
            _ => Err(RosterError::InvalidInput(format!(
                "invalid illness severity: {s}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Watcher => "watcher",
            Self::Unstable => "unstable",
            Self::Critical => "critical",
        }
    }
}

/// A clinical alert attached to a patient. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub status: AlertStatus,
    pub description: NonEmptyText,
    pub created_by: NonEmptyText,
    pub created_at: DateTime<Utc>,
    pub source: NonEmptyText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    High,
    Medium,
    Informational,
}

impl AlertLevel {
    pub fn parse(s: &str) -> Result<Self, RosterError> {
        match s.trim().to_uppercase().as_str() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "INFORMATIONAL" => Ok(Self::Informational),
            _ => Err(RosterError::InvalidInput(format!("invalid alert level: {s}"))),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Informational => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Resolved,
}

impl AlertStatus {
    pub fn parse(s: &str) -> Result<Self, RosterError> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "RESOLVED" => Ok(Self::Resolved),
            _ => Err(RosterError::InvalidInput(format!(
                "invalid alert status: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_is_an_alias_for_watcher() {
        assert_eq!(
            IllnessSeverity::parse("Guarded").unwrap(),
            IllnessSeverity::Watcher
        );
        let parsed: IllnessSeverity = serde_yaml::from_str("guarded").unwrap();
        assert_eq!(parsed, IllnessSeverity::Watcher);
        assert!(IllnessSeverity::parse("fine").is_err());
    }

    #[test]
    fn alert_levels_parse_case_insensitively() {
        assert_eq!(AlertLevel::parse("high").unwrap(), AlertLevel::High);
        assert_eq!(
            AlertStatus::parse("Resolved").unwrap(),
            AlertStatus::Resolved
        );
        assert!(AlertLevel::parse("urgent").is_err());
    }
}
