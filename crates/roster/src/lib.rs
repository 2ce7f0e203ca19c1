//! Patient-data boundary for the handover core.
//!
//! The handover core never owns patient records. It reads them from an external
//! collaborator, and this crate defines what such a record looks like once it
//! crosses the boundary:
//! - domain types ([`Patient`], [`Alert`], [`Clinician`], [`IllnessSeverity`])
//! - a strict YAML roster wire model, with translation into the domain types
//!
//! Everything here is read-only from the core's perspective.

pub mod clinician;
pub mod patient;
pub mod roster;

pub use clinician::{ClinicalRole, Clinician};
pub use patient::{Alert, AlertLevel, AlertStatus, IllnessSeverity, Patient};
pub use roster::{Roster, RosterData};

/// Errors returned by the roster boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

/// Type alias for Results that can fail with a [`RosterError`].
pub type RosterResult<T> = Result<T, RosterError>;
