//! # Handover Core
//!
//! Core business logic for I-PASS shift handovers.
//!
//! This crate contains the handover state machines and the rules that guard them:
//! - [`PermissionGuard`]: who may write which section, delete which entry, confirm what
//! - [`SyncStatusTracker`]: whether a section's edits have been persisted
//! - [`ActionRegistry`] / [`ContingencyRegistry`]: ordered cross-shift entries
//! - [`IPassDocument`]: the five-section document for one patient
//! - [`ConfirmationGate`]: the receiving physician's checklist and finalization
//! - [`HandoverSession`]: the patient queue, navigation and progress
//! - [`HandoverService`]: the async store that wires the above to the external
//!   collaborators (patient data, persistence, presence)
//!
//! **No transport concerns**: HTTP routing, authentication and rendering belong to the
//! outer layers. Patient data is read-only here; see `handover-roster`.

pub mod actions;
pub mod collaborators;
pub mod config;
pub mod confirmation;
pub mod constants;
pub mod contingency;
pub mod document;
pub mod error;
pub mod file_store;
pub mod memory;
pub mod permission;
pub mod provider;
pub mod registry;
pub mod service;
pub mod session;
pub mod sync;

pub use actions::{ActionItem, ActionRegistry, NewActionItem, Priority};
pub use collaborators::{
    Collaborator, FinalizeAck, NoPresence, PatientDataProvider, PersistenceService,
    PresenceError, PresenceService, SaveAck,
};
pub use config::{
    ChecklistTemplateItem, ContingencyDeleteRule, CoreConfig, RetryPolicy, SeedStrategy,
};
pub use confirmation::{ChecklistItem, ConfirmationGate, Finalization};
pub use contingency::{ContingencyPlan, ContingencyRegistry, ContingencyStatus, NewContingencyPlan};
pub use document::{
    DocumentStatus, EditOutcome, IPassDocument, Section, SectionContent, SectionKind,
};
pub use error::{
    ErrorKind, FinalizeError, HandoverError, HandoverResult, PermissionError, SyncError,
    ValidationError,
};
pub use file_store::FileSectionStore;
pub use memory::InMemoryPersistence;
pub use permission::{CareTeam, PermissionGuard, WriterRole};
pub use provider::StaticRoster;
pub use registry::{Registry, RegistryEntry};
pub use service::{Closed, HandoverService, Open};
pub use session::{HandoverSession, PatientHandover, PatientProgress, SessionSummary};
pub use sync::{SaveTicket, SyncStatus, SyncStatusTracker};

// Boundary types re-exported so callers need only this crate.
pub use handover_ids::{ClinicianId, EntryId, IdError, PatientId};
pub use handover_roster::{
    Alert, AlertLevel, AlertStatus, ClinicalRole, Clinician, IllnessSeverity, Patient,
};
pub use handover_types::{NonEmptyText, Shift, ShiftTag};
