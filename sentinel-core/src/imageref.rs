//! Parsing of raw image reference strings into `(host, repo, tag, digest)`.
//!
//! An `ImageRef` is parsed lazily: construction never fails (there is no such thing as an
//! unparsable reference here — worst case we fall back to the Docker Hub defaults), which
//! matches the "surfaced as a zero/empty result; never panics" error policy for invalid
//! input in the design note on malformed refs.

pub const DOCKER_HUB_HOST: &str = "docker.io";

fn is_host_segment(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':')
}

fn normalize_host(host: &str) -> String {
    match host {
        "registry-1.docker.io" | "index.docker.io" => DOCKER_HUB_HOST.to_string(),
        other => other.to_string(),
    }
}

/// Strips a trailing `@sha256:...` (or any `@algo:hex`) digest suffix, if present.
fn strip_digest(s: &str) -> (&str, &str) {
    match s.rfind('@') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

/// Extracts the registry host portion of an image reference.
pub fn registry_host(reference: &str) -> String {
    let (without_digest, _) = strip_digest(reference);
    match without_digest.find('/') {
        None => DOCKER_HUB_HOST.to_string(),
        Some(idx) => {
            let first = &without_digest[..idx];
            if is_host_segment(first) {
                normalize_host(first)
            } else {
                DOCKER_HUB_HOST.to_string()
            }
        }
    }
}

/// Extracts the repository path portion of an image reference.
pub fn repo_path(reference: &str) -> String {
    let (without_digest, _) = strip_digest(reference);

    // Strip a tag, but only when the final ':' comes after the final '/' — otherwise it's
    // part of a `host:port` segment, not a tag separator.
    let last_slash = without_digest.rfind('/');
    let last_colon = without_digest.rfind(':');
    let without_tag = match (last_colon, last_slash) {
        (Some(c), Some(s)) if c > s => &without_digest[..c],
        (Some(c), None) => &without_digest[..c],
        _ => without_digest,
    };

    let mut parts = without_tag.splitn(2, '/');
    let first = parts.next().unwrap_or("");
    let rest = parts.next();

    let repo = match rest {
        Some(rest) if is_host_segment(first) => rest,
        Some(_) => without_tag,
        None => without_tag,
    };

    if repo.contains('/') {
        repo.to_string()
    } else {
        format!("library/{repo}")
    }
}

/// Extracts the tag portion of an image reference, empty if untagged or digest-pinned.
pub fn extract_tag(reference: &str) -> String {
    let (without_digest, digest) = strip_digest(reference);
    if !digest.is_empty() {
        return String::new();
    }
    match without_digest.rfind(':') {
        Some(idx) => {
            let candidate = &without_digest[idx + 1..];
            if candidate.contains('/') {
                String::new()
            } else {
                candidate.to_string()
            }
        }
        None => String::new(),
    }
}

fn extract_digest(reference: &str) -> String {
    let (_, digest) = strip_digest(reference);
    digest.to_string()
}

/// A canonicalized image reference: `(host, repo, tag, digest)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    raw: String,
    host: String,
    repo: String,
    tag: String,
    digest: String,
}

impl ImageRef {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let host = registry_host(&raw);
        let repo = repo_path(&raw);
        let tag = extract_tag(&raw);
        let digest = extract_digest(&raw);
        ImageRef {
            raw,
            host,
            repo,
            tag,
            digest,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn is_digest_pinned(&self) -> bool {
        !self.digest.is_empty()
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Extracts the trailing `sha256:...` substring of a digest-bearing string (a full image
/// reference, a bare digest, or a `Docker-Content-Digest` header value), for use by
/// `digests_match`. Returns `None` if no `sha256:` substring is present.
pub fn trailing_sha256(s: &str) -> Option<&str> {
    let idx = s.find("sha256:")?;
    Some(&s[idx..])
}

/// `digests_match(x, y)` holds iff the trailing `sha256:...` component of both strings match.
pub fn digests_match(a: &str, b: &str) -> bool {
    match (trailing_sha256(a), trailing_sha256(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_host_scenarios() {
        assert_eq!(registry_host("nginx"), "docker.io");
        assert_eq!(
            registry_host("registry-1.docker.io/library/nginx"),
            "docker.io"
        );
        assert_eq!(registry_host("ghcr.io/u/r:v1"), "ghcr.io");
        assert_eq!(registry_host("index.docker.io/library/nginx"), "docker.io");
        assert_eq!(registry_host("localhost:5000/myimage:tag"), "localhost:5000");
        assert_eq!(registry_host("myimage@sha256:abc"), "docker.io");
    }

    #[test]
    fn repo_path_scenarios() {
        assert_eq!(repo_path("nginx:1.25"), "library/nginx");
        assert_eq!(repo_path("ghcr.io/user/repo:v1.0"), "user/repo");
        assert_eq!(repo_path("nginx"), "library/nginx");
        assert_eq!(repo_path("localhost:5000/myimage:tag"), "library/myimage");
        assert_eq!(repo_path("user/repo"), "user/repo");
    }

    #[test]
    fn extract_tag_scenarios() {
        assert_eq!(extract_tag("nginx:1.25"), "1.25");
        assert_eq!(extract_tag("nginx"), "");
        assert_eq!(extract_tag("nginx@sha256:abc"), "");
        assert_eq!(extract_tag("localhost:5000/myimage"), "");
        assert_eq!(extract_tag("localhost:5000/myimage:tag"), "tag");
    }

    #[test]
    fn digest_pinned_is_always_local() {
        let r = ImageRef::parse("nginx@sha256:deadbeef");
        assert!(r.is_digest_pinned());
        assert_eq!(r.digest(), "sha256:deadbeef");
    }

    #[test]
    fn digests_match_trailing_substring() {
        assert!(digests_match(
            "nginx@sha256:abc123",
            "registry-1.docker.io/library/nginx@sha256:abc123"
        ));
        assert!(!digests_match("nginx@sha256:abc123", "nginx@sha256:def456"));
        assert!(!digests_match("nginx", "nginx@sha256:def456"));
    }
}
