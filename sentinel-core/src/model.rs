//! Plain data types shared between the registry checker and the agent: `CheckResult`,
//! `RegistryState`, `JournalEntry`, `SessionState`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of comparing a container's local image digest against the registry's remote
/// digest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    pub reference: String,
    pub local_digest: String,
    pub remote_digest: String,
    pub update_available: bool,
    pub is_local: bool,
    pub error: Option<String>,
    pub newer_versions: Vec<String>,
    pub resolved_current_version: Option<String>,
    pub resolved_target_version: Option<String>,
}

impl CheckResult {
    pub fn local(reference: impl Into<String>) -> Self {
        CheckResult {
            reference: reference.into(),
            is_local: true,
            ..Default::default()
        }
    }

    pub fn error(reference: impl Into<String>, error: impl Into<String>) -> Self {
        CheckResult {
            reference: reference.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Enforces the invariant `update_available => !is_local && error == None`.
    pub fn is_well_formed(&self) -> bool {
        if self.update_available && (self.is_local || self.error.is_some()) {
            return false;
        }
        true
    }
}

/// Per-registry-host rate-limit bookkeeping, keyed by canonical host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryState {
    pub limit: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
    pub is_auth: bool,
    pub has_limits: bool,
    pub container_count: u64,
    pub last_updated: DateTime<Utc>,
}

impl RegistryState {
    pub fn unknown(now: DateTime<Utc>) -> Self {
        RegistryState {
            limit: -1,
            remaining: -1,
            reset_at: now,
            is_auth: false,
            has_limits: false,
            container_count: 0,
            last_updated: now,
        }
    }
}

/// One action taken (or attempted) during disconnection, appended to the offline journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub container: String,
    pub old_image: String,
    pub new_image: String,
    pub old_digest: String,
    pub new_digest: String,
    pub outcome: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl JournalEntry {
    pub fn new(action: impl Into<String>, container: impl Into<String>) -> Self {
        JournalEntry {
            id: String::new(),
            timestamp: Utc::now(),
            action: action.into(),
            container: container.into(),
            old_image: String::new(),
            new_image: String::new(),
            old_digest: String::new(),
            new_digest: String::new(),
            outcome: String::new(),
            error: None,
            duration_ms: 0,
        }
    }
}

/// The agent's top-level lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    Unenrolled,
    Enrolling,
    Connecting,
    Connected,
    Disconnected,
    Autonomous,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_result_well_formed() {
        let mut r = CheckResult::local("nginx@sha256:abc");
        assert!(r.is_well_formed());
        r.update_available = true;
        assert!(!r.is_well_formed());
    }

    #[test]
    fn registry_state_unknown_marker() {
        let now = Utc::now();
        let s = RegistryState::unknown(now);
        assert_eq!(s.limit, -1);
        assert!(!s.has_limits);
    }
}
