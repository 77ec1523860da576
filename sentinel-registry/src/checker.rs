//! Composes the Docker daemon interface and the registry client into a `CheckResult`.

use sentinel_core::imageref::{self, ImageRef};
use sentinel_core::{CheckResult, semver};
use sentinel_docker::Daemon;

use crate::client::RegistryClient;
use crate::ratelimit::RateLimitTracker;
use crate::resolver;

/// Always `false`: the registry check
/// handles truly-local images through its own graceful-failure path instead; preserved
/// verbatim even though the name suggests otherwise.
fn is_local_image(_reference: &ImageRef) -> bool {
    false
}

/// Checks a single image reference against its registry.
pub async fn check(daemon: &dyn Daemon, reference: &str) -> CheckResult {
    let image = ImageRef::parse(reference);

    if is_local_image(&image) || image.is_digest_pinned() {
        return CheckResult::local(reference);
    }

    let local_digest = match daemon.image_digest(reference).await {
        Ok(digest) => digest,
        Err(e) => return CheckResult::error(reference, e.to_string()),
    };

    // Unreachability on the remote side is "no update", not a failure.
    let remote_digest = match daemon.distribution_digest(reference).await {
        Ok(digest) => digest,
        Err(_) => return CheckResult::local(reference),
    };

    let update_available = !imageref::digests_match(&local_digest, &remote_digest);

    CheckResult {
        reference: reference.to_string(),
        local_digest,
        remote_digest,
        update_available,
        is_local: false,
        error: None,
        newer_versions: Vec::new(),
        resolved_current_version: None,
        resolved_target_version: None,
    }
}

/// Checks a reference and additionally resolves newer semver tags, if any.
pub async fn check_versioned(
    daemon: &dyn Daemon,
    client: &RegistryClient,
    tracker: &RateLimitTracker,
    reference: &str,
) -> CheckResult {
    let mut result = check(daemon, reference).await;
    if result.is_local || result.error.is_some() {
        return result;
    }

    let image = ImageRef::parse(reference);
    let tag = image.tag();

    let tags_with_semver_tag = !tag.is_empty() && semver::parse(tag).is_ok();
    if tags_with_semver_tag {
        if let Ok(tags) = client.list_tags(image.host(), image.repo()).await {
            let newer = semver::newer_versions(tag, &tags);
            if !newer.is_empty() {
                result.update_available = true;
            }
            result.newer_versions = newer;
        }
    }

    let untagged_or_latest = tag.is_empty() || tag == "latest";
    if untagged_or_latest && result.update_available {
        if let Ok(tags) = client.list_tags(image.host(), image.repo()).await {
            let resolved = resolver::resolve(
                client,
                tracker,
                image.host(),
                image.repo(),
                &tags,
                &result.local_digest,
                &result.remote_digest,
            )
            .await;
            result.resolved_current_version = resolved.current_version;
            result.resolved_target_version = resolved.target_version;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sentinel_docker::mock::MockDaemon;

    use super::*;

    #[tokio::test]
    async fn digest_pinned_ref_is_always_local() {
        let daemon: Arc<dyn Daemon> = Arc::new(MockDaemon::new());
        let result = check(daemon.as_ref(), "nginx@sha256:deadbeef").await;
        assert!(result.is_local);
    }

    #[tokio::test]
    async fn matching_digests_report_no_update() {
        let daemon = MockDaemon::new().with_container("web", "nginx:1.25", "sha256:same");
        let result = check(&daemon, "nginx:1.25").await;
        assert!(!result.update_available);
        assert!(!result.is_local);
    }

    #[tokio::test]
    async fn missing_local_image_is_not_local_but_errors() {
        let daemon = MockDaemon::new();
        let result = check(&daemon, "nginx:1.25").await;
        assert!(result.error.is_some());
        assert!(!result.is_local);
    }
}
