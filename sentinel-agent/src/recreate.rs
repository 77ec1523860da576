//! `update-container` flow: stop / remove / preserve-config / recreate / start.

use std::time::{Duration, Instant};

use sentinel_core::JournalEntry;
use sentinel_docker::{Daemon, ListScope};
use sentinel_proto::Outcome;

const STOP_GRACE: Duration = Duration::from_secs(30);

pub struct UpdateOutcome {
    pub outcome: Outcome,
    pub old_digest: String,
    pub new_digest: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Find container id by name -> inspect -> snapshot old image/digest -> pull target -> snapshot
/// new digest -> stop -> remove -> synthesize create-config -> create -> start. Not
/// transactional at the daemon level: a failure partway through leaves partial state, which
/// is surfaced as `outcome = failed` rather than rolled back.
pub async fn update_container(
    daemon: &dyn Daemon,
    container_name: &str,
    target_image: &str,
) -> (UpdateOutcome, JournalEntry) {
    let start = Instant::now();
    let mut entry = JournalEntry::new("update-container", container_name);
    entry.new_image = target_image.to_string();

    let outcome = run(daemon, container_name, target_image, &mut entry).await;
    entry.duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok((old_digest, new_digest)) => {
            entry.old_digest = old_digest.clone();
            entry.new_digest = new_digest.clone();
            entry.outcome = "success".to_string();
            (
                UpdateOutcome {
                    outcome: Outcome::Success,
                    old_digest,
                    new_digest,
                    error: None,
                    duration_ms: entry.duration_ms,
                },
                entry,
            )
        }
        Err(e) => {
            let message = e.to_string();
            entry.outcome = "failed".to_string();
            entry.error = Some(message.clone());
            (
                UpdateOutcome {
                    outcome: Outcome::Failed,
                    old_digest: entry.old_digest.clone(),
                    new_digest: entry.new_digest.clone(),
                    error: Some(message),
                    duration_ms: entry.duration_ms,
                },
                entry,
            )
        }
    }
}

async fn run(
    daemon: &dyn Daemon,
    container_name: &str,
    target_image: &str,
    entry: &mut JournalEntry,
) -> Result<(String, String), sentinel_docker::Error> {
    let containers = daemon.list_containers(ListScope::All).await?;
    let info = containers
        .into_iter()
        .find(|c| c.name == container_name)
        .ok_or_else(|| sentinel_docker::Error::NotFound(container_name.to_string()))?;

    let inspect = daemon.inspect(&info.id).await?;
    entry.old_image = inspect.image.clone();
    let old_digest = daemon.image_digest(&inspect.image).await.unwrap_or_default();
    entry.old_digest = old_digest.clone();

    daemon.pull(target_image).await?;
    let new_digest = daemon.image_digest(target_image).await.unwrap_or_default();

    daemon.stop(&info.id, STOP_GRACE).await?;
    daemon.remove(&info.id).await?;

    let spec = inspect.recreate_with_image(target_image);
    let new_id = daemon.create(&spec).await?;
    daemon.start(&new_id).await?;

    Ok((old_digest, new_digest))
}

#[cfg(test)]
mod tests {
    use sentinel_docker::mock::MockDaemon;

    use super::*;

    #[tokio::test]
    async fn successful_update_recreates_and_starts() {
        let daemon = MockDaemon::new().with_container("web", "nginx:1.25", "sha256:old");
        daemon.set_image_digest("nginx:1.26", "sha256:new");

        let (outcome, entry) = update_container(&daemon, "web", "nginx:1.26").await;
        assert_eq!(outcome.outcome, Outcome::Success);
        assert_eq!(outcome.old_digest, "sha256:old");
        assert_eq!(outcome.new_digest, "sha256:new");
        assert_eq!(entry.outcome, "success");
        assert_eq!(daemon.created_specs().len(), 1);
        assert_eq!(daemon.removed(), vec!["mock-web".to_string()]);
    }

    #[tokio::test]
    async fn missing_container_fails_gracefully() {
        let daemon = MockDaemon::new();
        let (outcome, entry) = update_container(&daemon, "missing", "nginx:1.26").await;
        assert_eq!(outcome.outcome, Outcome::Failed);
        assert!(outcome.error.is_some());
        assert_eq!(entry.outcome, "failed");
    }
}
