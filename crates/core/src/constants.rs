//! Constants used throughout the handover core crate.

/// Default directory for handover data when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "handover_data";

/// Shift transition assumed when none is configured.
pub const DEFAULT_SHIFT_TAG: &str = "Night→Day";

/// Quiet period after the last edit before a section is saved.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1_000;

/// Save attempts per debounced save (the first attempt included).
pub const DEFAULT_SAVE_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the first retry; doubled for each further retry.
pub const DEFAULT_RETRY_INITIAL_BACKOFF_MS: u64 = 500;

/// Upper bound for a single retry backoff.
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 8_000;

/// Directory (inside a patient's sharded directory) holding saved sections.
pub const SECTIONS_DIR_NAME: &str = "sections";

/// Filename for the finalization record of a patient's handover.
pub const HANDOVER_RECORD_FILENAME: &str = "handover.yaml";

/// Checklist item id of the irrevocable responsibility acceptance.
pub const ACCEPT_RESPONSIBILITY_ITEM: &str = "accept-responsibility";
