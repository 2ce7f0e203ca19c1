//! Per-section synchronization status.
//!
//! A tracker moves `Synced -> Pending` on every edit, and `Pending -> Synced | Error` when a
//! persistence attempt completes. Each edit issues a new [`SaveTicket`]; results carrying an
//! older ticket are disregarded, so a slow save can never report a newer edit as persisted.
//!
//! `Offline` is orthogonal: while offline it replaces `Pending` and `Synced` in the reported
//! status, and failed attempts leave the section `Pending` so the save is retried when
//! connectivity returns. An `Error` stays visible while offline.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Pending,
    Error,
    Offline,
}

/// Identifies the edit generation a save attempt belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SaveTicket(u64);

#[derive(Clone, Debug)]
pub struct SyncStatusTracker {
    phase: SyncStatus,
    offline: bool,
    generation: u64,
    last_synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl Default for SyncStatusTracker {
    fn default() -> Self {
        Self {
            phase: SyncStatus::Synced,
            offline: false,
            generation: 0,
            last_synced_at: None,
            last_error: None,
        }
    }
}

impl SyncStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SyncStatus {
        if self.offline && self.phase != SyncStatus::Error {
            SyncStatus::Offline
        } else {
            self.phase
        }
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Records a local edit. The returned ticket must accompany the persistence result.
    pub fn on_edit(&mut self) -> SaveTicket {
        self.generation += 1;
        self.phase = SyncStatus::Pending;
        self.last_error = None;
        SaveTicket(self.generation)
    }

    /// True if no edit has happened since `ticket` was issued.
    pub fn is_current(&self, ticket: SaveTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Whether a debounced save for `ticket` should call the persistence collaborator now.
    pub fn should_persist(&self, ticket: SaveTicket) -> bool {
        self.is_current(ticket) && !self.offline && self.phase == SyncStatus::Pending
    }

    /// Applies the outcome of a persistence attempt. Returns `false` when the result was
    /// disregarded because a newer edit superseded it.
    pub fn on_persist_result(
        &mut self,
        ticket: SaveTicket,
        result: Result<(), &SyncError>,
        at: DateTime<Utc>,
    ) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(?ticket, generation = self.generation, "stale save result ignored");
            return false;
        }

        match result {
            Ok(()) => {
                self.phase = SyncStatus::Synced;
                self.last_synced_at = Some(at);
                self.last_error = None;
            }
            Err(err) if self.offline => {
                tracing::debug!(error = %err, "save failed while offline, waiting for connectivity");
                self.phase = SyncStatus::Pending;
            }
            Err(err) => {
                self.phase = SyncStatus::Error;
                self.last_error = Some(err.to_string());
            }
        }
        true
    }

    /// Records a connectivity change. On reconnect with unsaved edits a fresh ticket is
    /// returned so the caller can schedule a retry.
    pub fn set_offline(&mut self, offline: bool) -> Option<SaveTicket> {
        if self.offline == offline {
            return None;
        }
        self.offline = offline;

        if !offline && self.phase == SyncStatus::Pending {
            self.generation += 1;
            return Some(SaveTicket(self.generation));
        }
        None
    }
}
