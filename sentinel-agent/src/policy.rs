//! Persistent per-container policy and server-pushed settings cache.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use sentinel_core::Policy;
use sentinel_proto::SettingsUpdate;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::fsutil;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Io(#[from] std::io::Error),
    Json(#[from] serde_json::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The on-disk shape of `policy_cache.json` — durations stored as nanoseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Persisted {
    policies: BTreeMap<String, Policy>,
    default_policy: Option<Policy>,
    poll_interval: u64,
    grace_period: u64,
    image_cleanup: bool,
    hooks_enabled: bool,
    dependency_aware: bool,
    rollback_policy: String,
}

impl Default for Persisted {
    fn default() -> Self {
        Persisted {
            policies: BTreeMap::new(),
            default_policy: None,
            poll_interval: Duration::from_secs(6 * 60 * 60).as_nanos() as u64,
            grace_period: Duration::from_secs(5 * 60).as_nanos() as u64,
            image_cleanup: false,
            hooks_enabled: true,
            dependency_aware: false,
            rollback_policy: String::new(),
        }
    }
}

pub struct PolicyCache {
    path: PathBuf,
    state: RwLock<Persisted>,
}

impl PolicyCache {
    /// Loads from `path`; a missing file is not an error, just an empty cache.
    pub fn load(path: PathBuf) -> Result<Self, Error> {
        let state = match fsutil::read_optional(&path)? {
            None => Persisted::default(),
            Some(data) if data.is_empty() => Persisted::default(),
            Some(data) => serde_json::from_slice(&data)?,
        };
        Ok(PolicyCache {
            path,
            state: RwLock::new(state),
        })
    }

    async fn persist(&self, state: &Persisted) -> Result<(), Error> {
        let data = serde_json::to_vec_pretty(state)?;
        fsutil::write_atomic(&self.path, &data)?;
        Ok(())
    }

    /// `PolicySync`: full-replace of the per-container map, optional default update.
    pub async fn apply_policy_sync(
        &self,
        policies: BTreeMap<String, Policy>,
        default_policy: Option<Policy>,
    ) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state.policies = policies;
        if let Some(default_policy) = default_policy {
            state.default_policy = Some(default_policy);
        }
        self.persist(&state).await
    }

    /// `SettingsSync`: only present fields overwrite.
    pub async fn apply_settings_sync(&self, update: SettingsUpdate) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if let Some(secs) = update.poll_interval_secs {
            state.poll_interval = Duration::from_secs(secs).as_nanos() as u64;
        }
        if let Some(secs) = update.grace_period_secs {
            state.grace_period = Duration::from_secs(secs).as_nanos() as u64;
        }
        if let Some(v) = update.image_cleanup {
            state.image_cleanup = v;
        }
        if let Some(v) = update.hooks_enabled {
            state.hooks_enabled = v;
        }
        if let Some(v) = update.dependency_aware {
            state.dependency_aware = v;
        }
        if let Some(v) = update.rollback_policy {
            state.rollback_policy = v;
        }
        self.persist(&state).await
    }

    /// Resolves the effective policy for a container: its label override beats the
    /// server-pushed per-container override, which beats the server default.
    pub async fn resolve_policy(&self, container_name: &str, label_override: Option<Policy>) -> Policy {
        let state = self.state.read().await;
        let server_override = state.policies.get(container_name).copied();
        sentinel_core::policy::resolve_policy(label_override, server_override, state.default_policy)
    }

    pub async fn poll_interval(&self) -> Duration {
        Duration::from_nanos(self.state.read().await.poll_interval)
    }

    pub async fn grace_period_offline(&self) -> Duration {
        Duration::from_nanos(self.state.read().await.grace_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PolicyCache::load(dir.path().join("policy_cache.json")).unwrap();
        assert_eq!(cache.resolve_policy("web", None).await, Policy::Manual);
    }

    #[tokio::test]
    async fn policy_sync_overrides_resolve_to_server_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PolicyCache::load(dir.path().join("policy_cache.json")).unwrap();

        let mut policies = BTreeMap::new();
        policies.insert("web".to_string(), Policy::Auto);
        cache.apply_policy_sync(policies, Some(Policy::Pinned)).await.unwrap();

        assert_eq!(cache.resolve_policy("web", None).await, Policy::Auto);
        assert_eq!(cache.resolve_policy("db", None).await, Policy::Pinned);
        assert_eq!(
            cache.resolve_policy("web", Some(Policy::Manual)).await,
            Policy::Manual
        );
    }

    #[tokio::test]
    async fn settings_sync_only_overwrites_present_fields() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PolicyCache::load(dir.path().join("policy_cache.json")).unwrap();
        let default_poll = cache.poll_interval().await;

        cache
            .apply_settings_sync(SettingsUpdate {
                grace_period_secs: Some(120),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(cache.poll_interval().await, default_poll);
        assert_eq!(cache.grace_period_offline().await, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy_cache.json");
        {
            let cache = PolicyCache::load(path.clone()).unwrap();
            let mut policies = BTreeMap::new();
            policies.insert("web".to_string(), Policy::Pinned);
            cache.apply_policy_sync(policies, None).await.unwrap();
        }
        let reloaded = PolicyCache::load(path).unwrap();
        assert_eq!(reloaded.resolve_policy("web", None).await, Policy::Pinned);
    }
}
