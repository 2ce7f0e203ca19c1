//! Identifiers used by the handover core.
//!
//! Two families of identifier live here:
//!
//! - **Identity ids** ([`ClinicianId`], [`PatientId`]): opaque UUIDs in the canonical
//!   form of **32 lowercase hexadecimal characters** (no hyphens). Permission checks compare
//!   these ids, never display names, so two clinicians who share a name can never act for
//!   each other.
//! - **Entry ids** ([`EntryId`]): time-prefixed identifiers assigned by the server when an
//!   action item, contingency plan or edit is accepted. The timestamp prefix is the
//!   submission time and drives deterministic ordering.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Externally supplied identifiers (REST paths, roster files) must already be canonical;
//! hyphenated or uppercase input is rejected rather than normalised.
//!
//! ## Entry id form
//! `YYYYMMDDTHHMMSS.mmmZ-<canonical uuid>`, for example
//! `20260111T143522.045Z-550e8400e29b41d4a716446655440000`.

mod canonical;
mod entry;

pub use canonical::{ClinicianId, PatientId};
pub use entry::{EntryId, EntryIdGenerator};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Error type for identifier parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    /// Invalid input provided
    #[error("invalid identifier: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
