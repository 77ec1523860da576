//! A narrow interface to the Docker daemon, consumed by `sentinel-registry`'s update
//! checker and `sentinel-agent`'s session loop — neither of which should ever reach into a
//! concrete Docker client directly.
//!
//! [`BollardDaemon`] is the production implementation, backed by `bollard`. [`mock::MockDaemon`]
//! is an in-memory stand-in used by both this crate's and `sentinel-agent`'s tests.

mod bollard_daemon;
pub mod mock;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

pub use bollard_daemon::{BollardDaemon, ConnectConfig};
pub use types::{
    ContainerInfo, ContainerInspect, CreateSpec, ExecOptions, ExecResult, ImageInfo, ListScope,
    NetworkEndpoint,
};

pub const SWARM_TASK_LABEL: &str = "com.docker.swarm.task";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    Bollard(#[from] bollard::errors::Error),
    NotFound(String),
    MissingDigestLabel,
    Timeout,
    BadCreateConfig(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[async_trait]
pub trait Daemon: Send + Sync {
    async fn list_containers(&self, scope: ListScope) -> Result<Vec<ContainerInfo>, Error>;
    async fn inspect(&self, id: &str) -> Result<ContainerInspect, Error>;
    async fn create(&self, spec: &CreateSpec) -> Result<String, Error>;
    async fn start(&self, id: &str) -> Result<(), Error>;
    async fn stop(&self, id: &str, grace: Duration) -> Result<(), Error>;
    async fn remove(&self, id: &str) -> Result<(), Error>;
    async fn restart(&self, id: &str) -> Result<(), Error>;
    async fn pull(&self, image: &str) -> Result<(), Error>;

    /// Local image digest, consumed by the update checker.
    async fn image_digest(&self, image: &str) -> Result<String, Error>;
    /// Remote distribution digest, resolved via the daemon's own registry credentials —
    /// unreachability is surfaced as a typed error, not a panic, so the
    /// checker can treat it as "no update" per its graceful-failure policy.
    async fn distribution_digest(&self, image: &str) -> Result<String, Error>;

    async fn list_images(&self) -> Result<Vec<ImageInfo>, Error>;
    async fn prune_images(&self) -> Result<u64, Error>;
    async fn remove_image(&self, id: &str) -> Result<(), Error>;
    async fn tag_image(&self, id: &str, repo: &str, tag: &str) -> Result<(), Error>;

    async fn exec(&self, id: &str, command: &[String], opts: ExecOptions) -> Result<ExecResult, Error>;
    async fn logs(&self, id: &str, tail: u64) -> Result<String, Error>;
}

/// Strips the container's single leading `/` from a raw Docker container name.
pub fn strip_leading_slash(name: &str) -> String {
    name.strip_prefix('/').unwrap_or(name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_slash() {
        assert_eq!(strip_leading_slash("/web-1"), "web-1");
        assert_eq!(strip_leading_slash("web-1"), "web-1");
    }
}
