//! Two-pass manifest HEAD sweep mapping digests back to semver tags.
//!
//! The common case — the newest tag matches the remote digest — resolves in the first pass;
//! hosts that are many releases behind fall through to a longer, bounded second pass.

use sentinel_core::imageref::digests_match;
use sentinel_core::semver;

use crate::client::RegistryClient;
use crate::ratelimit::RateLimitTracker;

const FIRST_PASS_TAGS: usize = 10;
const SECOND_PASS_TAGS: usize = 50;
const RESOLVER_RESERVE: i64 = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolved {
    pub current_version: Option<String>,
    pub target_version: Option<String>,
}

/// Token and credential resolution live inside `RegistryClient`, so this takes the client
/// directly rather than a bare host/repo pair.
pub async fn resolve(
    client: &RegistryClient,
    tracker: &RateLimitTracker,
    host: &str,
    repo: &str,
    tags: &[String],
    local_digest: &str,
    remote_digest: &str,
) -> Resolved {
    let mut parsed: Vec<_> = tags.iter().filter_map(|t| semver::parse(t).ok()).collect();
    parsed.sort_by(|a, b| b.cmp(a));

    let mut resolved = Resolved::default();
    let mut index = 0;

    while index < parsed.len() && index < FIRST_PASS_TAGS {
        if resolved.current_version.is_some() && resolved.target_version.is_some() {
            break;
        }
        let (ok, _wait) = tracker.can_proceed(host, RESOLVER_RESERVE).await;
        if !ok {
            return resolved;
        }

        let tag = parsed[index].raw.clone();
        if let Ok(head) = client.head_manifest(host, repo, &tag).await {
            if resolved.current_version.is_none() && digests_match(&head.digest, local_digest) {
                resolved.current_version = Some(tag.clone());
            }
            if resolved.target_version.is_none() && digests_match(&head.digest, remote_digest) {
                resolved.target_version = Some(tag);
            }
        }
        index += 1;
    }

    if resolved.target_version.is_some() && resolved.current_version.is_none() {
        let end = (index + SECOND_PASS_TAGS).min(parsed.len());
        while index < end {
            let (ok, _wait) = tracker.can_proceed(host, RESOLVER_RESERVE).await;
            if !ok {
                break;
            }

            let tag = parsed[index].raw.clone();
            if let Ok(head) = client.head_manifest(host, repo, &tag).await {
                if digests_match(&head.digest, local_digest) {
                    resolved.current_version = Some(tag);
                    break;
                }
            }
            index += 1;
        }
    }

    resolved
}
