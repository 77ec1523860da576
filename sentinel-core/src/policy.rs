//! Per-container update policy, its three-level resolution hierarchy, and the label keys
//! that drive it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const LABEL_POLICY: &str = "sentinel.policy";
pub const LABEL_SEMVER: &str = "sentinel.semver";
pub const LABEL_INCLUDE_TAGS: &str = "sentinel.include-tags";
pub const LABEL_EXCLUDE_TAGS: &str = "sentinel.exclude-tags";
pub const LABEL_NOTIFY_SNOOZE: &str = "sentinel.notify-snooze";
pub const LABEL_SWARM_TASK: &str = "com.docker.swarm.task";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Policy {
    Auto,
    #[default]
    Manual,
    Pinned,
}

impl Policy {
    pub fn parse(label: &str) -> Option<Policy> {
        match label {
            "auto" => Some(Policy::Auto),
            "manual" => Some(Policy::Manual),
            "pinned" => Some(Policy::Pinned),
            _ => None,
        }
    }
}

/// Resolves the effective policy for a container: its label override beats a
/// server-pushed per-container override, which beats the server default, which beats the
/// hard default `Manual`.
pub fn resolve_policy(
    label_override: Option<Policy>,
    server_override: Option<Policy>,
    server_default: Option<Policy>,
) -> Policy {
    label_override
        .or(server_override)
        .or(server_default)
        .unwrap_or_default()
}

/// Parses `sentinel.notify-snooze`, accepting a `d` suffix for days in addition to anything
/// `humantime`-style duration suffixes normally support (`s`, `m`, `h`).
pub fn parse_notify_snooze(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(days) = value.strip_suffix('d') {
        let days: u64 = days.parse().ok()?;
        return Some(Duration::from_secs(days * 24 * 60 * 60));
    }
    if let Some(hours) = value.strip_suffix('h') {
        let hours: u64 = hours.parse().ok()?;
        return Some(Duration::from_secs(hours * 60 * 60));
    }
    if let Some(mins) = value.strip_suffix('m') {
        let mins: u64 = mins.parse().ok()?;
        return Some(Duration::from_secs(mins * 60));
    }
    if let Some(secs) = value.strip_suffix('s') {
        let secs: u64 = secs.parse().ok()?;
        return Some(Duration::from_secs(secs));
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Parses a comma-separated `sentinel.include-tags` / `sentinel.exclude-tags` label value.
pub fn parse_tag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_hierarchy_prefers_label() {
        assert_eq!(
            resolve_policy(Some(Policy::Auto), Some(Policy::Pinned), Some(Policy::Manual)),
            Policy::Auto
        );
        assert_eq!(
            resolve_policy(None, Some(Policy::Pinned), Some(Policy::Manual)),
            Policy::Pinned
        );
        assert_eq!(resolve_policy(None, None, Some(Policy::Auto)), Policy::Auto);
        assert_eq!(resolve_policy(None, None, None), Policy::Manual);
    }

    #[test]
    fn snooze_accepts_day_suffix() {
        assert_eq!(
            parse_notify_snooze("3d"),
            Some(Duration::from_secs(3 * 24 * 60 * 60))
        );
        assert_eq!(parse_notify_snooze("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_notify_snooze("45"), Some(Duration::from_secs(45)));
    }

    #[test]
    fn tag_list_trims_and_drops_empty() {
        assert_eq!(
            parse_tag_list("a, b ,, c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
