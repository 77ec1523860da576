//! The wire protocol between agent and server: the enrollment/state-report request-response
//! pair, and the tagged-union messages exchanged over the bidirectional channel.
//!
//! Every command the server can push to an agent is one variant of [`ServerMessage`]; every
//! new command adds a variant rather than a new type, and dispatch in `sentinel-agent` is a
//! single `match` over it. Frames are length-prefixed `bincode` (via its `serde` bridge, so
//! the same `chrono`/`serde`-derived types used for on-disk persistence serialize here too)
//! over the mTLS stream.

pub mod framing;

use chrono::{DateTime, Utc};
use sentinel_core::JournalEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContainerActionKind {
    Stop,
    Start,
    Restart,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    NotImplemented,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub policy: sentinel_core::Policy,
}

/// The enrollment request an unenrolled agent sends to trade a bootstrap token for a cert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollRequest {
    pub token: String,
    pub host_name: String,
    pub csr_der: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollResponse {
    pub host_id: String,
    pub agent_cert_pem: String,
    pub ca_cert_pem: String,
}

/// The state report an agent sends immediately after a fresh connection, and its ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateReport {
    pub host_id: String,
    pub containers: Vec<ContainerSummary>,
    pub timestamp: DateTime<Utc>,
    pub agent_version: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateReportAck {
    pub accepted: bool,
    pub message: String,
}

/// Settings pushed wholesale or partially by `SettingsSync`; only non-default (non-zero)
/// fields overwrite the agent's cached settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub poll_interval_secs: Option<u64>,
    pub grace_period_secs: Option<u64>,
    pub image_cleanup: Option<bool>,
    pub hooks_enabled: Option<bool>,
    pub dependency_aware: Option<bool>,
    pub rollback_policy: Option<String>,
}

/// Every message the server can push down the bidirectional channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    Heartbeat,
    ListContainers,
    UpdateContainer {
        request_id: String,
        container: String,
        target_image: String,
    },
    ContainerAction {
        request_id: String,
        container: String,
        action: ContainerActionKind,
    },
    PullImage {
        request_id: String,
        image: String,
    },
    RunHook {
        request_id: String,
        container: String,
        command: String,
        timeout_secs: Option<i64>,
    },
    Rollback {
        request_id: String,
        container: String,
    },
    PolicySync {
        policies: std::collections::BTreeMap<String, sentinel_core::Policy>,
        default_policy: Option<sentinel_core::Policy>,
    },
    SettingsSync(SettingsUpdate),
    CertRenewalResponse {
        certificate_pem: String,
    },
}

/// Every message the agent can push up the bidirectional channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentMessage {
    Heartbeat {
        host_id: String,
        agent_version: String,
        features: Vec<String>,
    },
    UpdateResult {
        request_id: String,
        container: String,
        outcome: Outcome,
        old_digest: String,
        new_digest: String,
        duration_ms: u64,
        error: Option<String>,
    },
    ContainerActionResult {
        request_id: String,
        container: String,
        outcome: Outcome,
        error: Option<String>,
    },
    ContainerList {
        containers: Vec<ContainerSummary>,
    },
    PullImageResult {
        request_id: String,
        outcome: Outcome,
        error: Option<String>,
    },
    RunHookResult {
        request_id: String,
        exit_code: i32,
        output: String,
        outcome: Outcome,
        error: Option<String>,
    },
    /// `rollback` is present in the dispatch surface but unimplemented — always answered
    /// with `Outcome::NotImplemented` rather than silently ignored.
    RollbackResult {
        request_id: String,
        outcome: Outcome,
        error: Option<String>,
    },
    JournalEntries {
        entries: Vec<JournalEntry>,
    },
}
