use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Keep,
    Remove,
}

/// Result of one classification call as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationOutcome {
    Decided(Decision),
    Failed(String),
}

impl ClassificationOutcome {
    pub fn should_suppress(&self) -> bool {
        matches!(self, ClassificationOutcome::Decided(Decision::Remove))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EpochId(pub u64);

impl EpochId {
    pub fn next(self) -> Self {
        EpochId(self.0 + 1)
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted store keys shared with the settings UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    PreferencesText,
    BlockedCount,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::PreferencesText => "preferencesText",
            StoreKey::BlockedCount => "blockedCount",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: StoreKey,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub preferences: String,
    pub blocked_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochCause {
    Startup,
    PreferencesChanged,
    Navigation,
}
