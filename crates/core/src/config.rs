//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into the handover
//! service behind an `Arc`. Nothing in the core reads environment variables while handling
//! a command; the `*_from_env_value` helpers exist so the binary can turn raw values into
//! typed settings with consistent defaults and errors.

use crate::constants::{
    ACCEPT_RESPONSIBILITY_ITEM, DEFAULT_RETRY_INITIAL_BACKOFF_MS, DEFAULT_RETRY_MAX_BACKOFF_MS,
    DEFAULT_SAVE_DEBOUNCE_MS, DEFAULT_SAVE_MAX_ATTEMPTS, DEFAULT_SHIFT_TAG,
};
use crate::{HandoverError, HandoverResult};
use handover_types::ShiftTag;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry behaviour for a single debounced save.
///
/// Only transient failures are retried. Once attempts are exhausted the section enters
/// the Error state and stays there until the next edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SAVE_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_RETRY_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_RETRY_MAX_BACKOFF_MS),
        }
    }
}

/// Who may delete a contingency plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContingencyDeleteRule {
    /// The assigned physician, regardless of which shift created the plan.
    #[default]
    AssignedPhysician,
    /// The assigned physician, and only for plans created in the current shift transition.
    AssignedPhysicianCurrentShift,
}

/// How a new document is populated when there is no previous-shift document to carry
/// forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SeedStrategy {
    /// Every section starts empty.
    Empty,
    /// Illness severity is initialised from the patient record.
    #[default]
    FromPatient,
}

/// One entry of the confirmation checklist template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistTemplateItem {
    pub id: String,
    pub label: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub critical: bool,
}

fn default_required() -> bool {
    true
}

impl ChecklistTemplateItem {
    fn new(id: &str, label: &str, required: bool, critical: bool) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            required,
            critical,
        }
    }
}

/// The standard I-PASS receiving checklist: six required items and one optional item.
pub fn default_checklist() -> Vec<ChecklistTemplateItem> {
    vec![
        ChecklistTemplateItem::new(
            "illness-severity",
            "Illness severity reviewed",
            true,
            false,
        ),
        ChecklistTemplateItem::new("patient-summary", "Patient summary reviewed", true, false),
        ChecklistTemplateItem::new("action-list", "Action list reviewed", true, false),
        ChecklistTemplateItem::new(
            "situation-awareness",
            "Situation awareness and contingency plans reviewed",
            true,
            false,
        ),
        ChecklistTemplateItem::new(
            "questions-answered",
            "Clarifying questions asked and answered",
            true,
            false,
        ),
        ChecklistTemplateItem::new(
            ACCEPT_RESPONSIBILITY_ITEM,
            "I accept clinical responsibility for this patient",
            true,
            true,
        ),
        ChecklistTemplateItem::new("family-updated", "Family update discussed", false, false),
    ]
}

fn validate_checklist(items: &[ChecklistTemplateItem]) -> HandoverResult<()> {
    if items.is_empty() {
        return Err(HandoverError::Config(
            "confirmation checklist cannot be empty".into(),
        ));
    }

    let mut seen = HashSet::new();
    for item in items {
        if item.id.trim().is_empty() || item.label.trim().is_empty() {
            return Err(HandoverError::Config(
                "checklist items need a non-empty id and label".into(),
            ));
        }
        if !seen.insert(item.id.as_str()) {
            return Err(HandoverError::Config(format!(
                "duplicate checklist item id '{}'",
                item.id
            )));
        }
        if item.critical && !item.required {
            return Err(HandoverError::Config(format!(
                "critical checklist item '{}' must also be required",
                item.id
            )));
        }
    }

    if !items.iter().any(|i| i.required) {
        return Err(HandoverError::Config(
            "confirmation checklist needs at least one required item".into(),
        ));
    }

    Ok(())
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    current_shift: ShiftTag,
    save_debounce: Duration,
    retry_policy: RetryPolicy,
    contingency_delete_rule: ContingencyDeleteRule,
    seed_strategy: SeedStrategy,
    checklist: Vec<ChecklistTemplateItem>,
}

impl CoreConfig {
    /// Create a `CoreConfig` with default timings, rules and checklist.
    pub fn new(data_dir: PathBuf, current_shift: ShiftTag) -> Self {
        Self {
            data_dir,
            current_shift,
            save_debounce: Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS),
            retry_policy: RetryPolicy::default(),
            contingency_delete_rule: ContingencyDeleteRule::default(),
            seed_strategy: SeedStrategy::default(),
            checklist: default_checklist(),
        }
    }

    pub fn with_save_debounce(mut self, debounce: Duration) -> Self {
        self.save_debounce = debounce;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> HandoverResult<Self> {
        if policy.max_attempts == 0 {
            return Err(HandoverError::Config(
                "retry policy needs at least one attempt".into(),
            ));
        }
        self.retry_policy = policy;
        Ok(self)
    }

    pub fn with_contingency_delete_rule(mut self, rule: ContingencyDeleteRule) -> Self {
        self.contingency_delete_rule = rule;
        self
    }

    pub fn with_seed_strategy(mut self, strategy: SeedStrategy) -> Self {
        self.seed_strategy = strategy;
        self
    }

    pub fn with_checklist(mut self, items: Vec<ChecklistTemplateItem>) -> HandoverResult<Self> {
        validate_checklist(&items)?;
        self.checklist = items;
        Ok(self)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn current_shift(&self) -> ShiftTag {
        self.current_shift
    }

    pub fn save_debounce(&self) -> Duration {
        self.save_debounce
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    pub fn contingency_delete_rule(&self) -> ContingencyDeleteRule {
        self.contingency_delete_rule
    }

    pub fn seed_strategy(&self) -> SeedStrategy {
        self.seed_strategy
    }

    pub fn checklist(&self) -> &[ChecklistTemplateItem] {
        &self.checklist
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the current shift transition; absent or blank values give `Night→Day`.
pub fn shift_tag_from_env_value(value: Option<String>) -> HandoverResult<ShiftTag> {
    let raw = non_blank(value).unwrap_or_else(|| DEFAULT_SHIFT_TAG.to_string());
    raw.parse()
        .map_err(|e| HandoverError::Config(format!("HANDOVER_SHIFT: {e}")))
}

/// Parse the save debounce in milliseconds; absent or blank values give the default.
pub fn save_debounce_from_env_value(value: Option<String>) -> HandoverResult<Duration> {
    match non_blank(value) {
        None => Ok(Duration::from_millis(DEFAULT_SAVE_DEBOUNCE_MS)),
        Some(v) => v.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            HandoverError::Config(format!(
                "HANDOVER_SAVE_DEBOUNCE_MS must be a whole number of milliseconds, got '{v}'"
            ))
        }),
    }
}

/// Parse the retry policy's attempt count, keeping the default backoff timings.
pub fn retry_policy_from_env_value(value: Option<String>) -> HandoverResult<RetryPolicy> {
    let Some(v) = non_blank(value) else {
        return Ok(RetryPolicy::default());
    };
    match v.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(RetryPolicy {
            max_attempts: n,
            ..RetryPolicy::default()
        }),
        _ => Err(HandoverError::Config(format!(
            "HANDOVER_SAVE_MAX_ATTEMPTS must be a positive integer, got '{v}'"
        ))),
    }
}

/// Parse the contingency deletion rule (`assigned_physician` or
/// `assigned_physician_current_shift`).
pub fn contingency_rule_from_env_value(
    value: Option<String>,
) -> HandoverResult<ContingencyDeleteRule> {
    match non_blank(value).as_deref().map(str::to_lowercase).as_deref() {
        None | Some("assigned_physician") => Ok(ContingencyDeleteRule::AssignedPhysician),
        Some("assigned_physician_current_shift") => {
            Ok(ContingencyDeleteRule::AssignedPhysicianCurrentShift)
        }
        Some(other) => Err(HandoverError::Config(format!(
            "HANDOVER_CONTINGENCY_DELETE must be 'assigned_physician' or 'assigned_physician_current_shift', got '{other}'"
        ))),
    }
}

/// Load a checklist template from a YAML list of items.
pub fn load_checklist(path: &Path) -> HandoverResult<Vec<ChecklistTemplateItem>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        HandoverError::Config(format!("failed to read checklist {}: {e}", path.display()))
    })?;
    let items: Vec<ChecklistTemplateItem> = serde_yaml::from_str(&text).map_err(|e| {
        HandoverError::Config(format!("invalid checklist {}: {e}", path.display()))
    })?;
    validate_checklist(&items)?;
    Ok(items)
}
