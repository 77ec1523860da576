//! Request/response records for the narrow Docker daemon interface.
//!
//! Modeled as plain data — a sum of operation names with typed request/response records —
//! rather than reaching into a concrete HTTP client from the core, per the "interface-based
//! decoupling" design note.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    RunningOnly,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    /// Stripped of any leading `/`.
    pub name: String,
    pub image: String,
    pub state: String,
    pub labels: BTreeMap<String, String>,
}

impl ContainerInfo {
    pub fn is_swarm_task(&self) -> bool {
        self.labels.contains_key(crate::SWARM_TASK_LABEL)
    }
}

/// A user-specified network endpoint's portable fields — excludes the daemon-assigned IP and
/// gateway, which must not be carried over into a recreated container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub network_id: String,
    pub aliases: Vec<String>,
    pub driver_opts: BTreeMap<String, String>,
    pub ipam_config: Option<serde_json::Value>,
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInspect {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Opaque container config (entrypoint, env, labels, ...) copied verbatim into the
    /// recreated container except for `image`, which the caller overwrites.
    pub config: serde_json::Value,
    /// Opaque host config, retained as-is when recreating.
    pub host_config: serde_json::Value,
    pub networks: BTreeMap<String, NetworkEndpoint>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSpec {
    pub name: String,
    pub image: String,
    pub config: serde_json::Value,
    pub host_config: serde_json::Value,
    pub networks: BTreeMap<String, NetworkEndpoint>,
}

impl ContainerInspect {
    /// Builds the create-config for a recreate-with-new-image flow: copy config, swap the
    /// image, keep host config as-is, keep only the portable endpoint fields per network.
    pub fn recreate_with_image(&self, new_image: &str) -> CreateSpec {
        CreateSpec {
            name: self.name.clone(),
            image: new_image.to_string(),
            config: self.config.clone(),
            host_config: self.host_config.clone(),
            networks: self.networks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub id: String,
    pub repo_tags: Vec<String>,
    pub in_use: bool,
}

/// Merged stdout+stderr — a deliberate lossy merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i32,
    pub output: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        ExecOptions {
            timeout: Duration::from_secs(30),
        }
    }
}
