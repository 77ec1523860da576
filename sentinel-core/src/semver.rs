//! Semver parsing, ordering, and scoped "newer versions" resolution.
//!
//! Calendar-versioned tags (`major >= 1900`, e.g. `2023.10.01`) are never compared against
//! ordinary semver tags — mixing the two schemes produces meaningless orderings, so any
//! candidate whose scheme doesn't match the current tag's scheme is silently excluded rather
//! than erroring.

use std::cmp::Ordering;

const CALVER_MAJOR_THRESHOLD: u64 = 1900;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    NotSemver,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Restricts which upgrades are admissible relative to the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Patch,
    Minor,
    Major,
    /// Inferred from the current tag's precision: a 3-part current restricts to `Patch`,
    /// a 2-part current restricts to `Minor`.
    Default,
}

impl Scope {
    pub fn parse(label: &str) -> Scope {
        match label {
            "patch" => Scope::Patch,
            "minor" => Scope::Minor,
            "major" | "all" => Scope::Major,
            _ => Scope::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Hyphen-suffixed pre-release label, empty for a release.
    pub pre: String,
    /// Original tag text, including any `v`/`V` prefix.
    pub raw: String,
    /// Whether the parsed tag had 3 numeric parts (`true`) or 2 (`false`); drives `Scope::Default`.
    has_patch: bool,
}

impl SemVer {
    pub fn is_release(&self) -> bool {
        self.pre.is_empty()
    }

    pub fn is_calver(&self) -> bool {
        self.major >= CALVER_MAJOR_THRESHOLD
    }

    fn numeric_tuple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.numeric_tuple().cmp(&other.numeric_tuple()) {
            Ordering::Equal => match (self.is_release(), other.is_release()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            },
            other => other,
        }
    }
}

/// Parses a tag into one of the recognized version schemes.
pub fn parse(tag: &str) -> Result<SemVer, Error> {
    let raw = tag.to_string();
    let stripped = tag.strip_prefix(['v', 'V']).unwrap_or(tag);

    let (numeric_part, pre) = match stripped.rsplit_once('-') {
        Some((num, pre)) => (num, pre),
        None => (stripped, ""),
    };

    let fields: Vec<&str> = numeric_part.split('.').collect();
    if fields.len() != 2 && fields.len() != 3 {
        return Err(Error::NotSemver);
    }
    if fields.iter().any(|f| f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit())) {
        return Err(Error::NotSemver);
    }

    let major: u64 = fields[0].parse().map_err(|_| Error::NotSemver)?;
    let minor: u64 = fields[1].parse().map_err(|_| Error::NotSemver)?;
    let (patch, has_patch) = if fields.len() == 3 {
        (fields[2].parse().map_err(|_| Error::NotSemver)?, true)
    } else {
        (0, false)
    };

    if !pre.is_empty() && !pre.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(Error::NotSemver);
    }

    Ok(SemVer {
        major,
        minor,
        patch,
        pre: pre.to_string(),
        raw,
        has_patch,
    })
}

/// Trichotomy falls out of deriving `Ord` on `SemVer`.
pub fn less_than(a: &SemVer, b: &SemVer) -> bool {
    a < b
}

fn in_scope(current: &SemVer, candidate: &SemVer, scope: Scope) -> bool {
    match scope {
        Scope::Patch => {
            candidate.major == current.major && candidate.minor == current.minor
        }
        Scope::Minor => candidate.major == current.major,
        Scope::Major => true,
        Scope::Default => {
            if current.has_patch {
                candidate.major == current.major && candidate.minor == current.minor
            } else {
                candidate.major == current.major
            }
        }
    }
}

/// Filters `tags` down to those strictly newer than `current` within `scope`.
pub fn newer_versions_scoped(current: &str, tags: &[String], scope: Scope) -> Vec<String> {
    let Ok(current) = parse(current) else {
        return Vec::new();
    };

    let mut matches: Vec<SemVer> = tags
        .iter()
        .filter_map(|t| parse(t).ok())
        .filter(|candidate| candidate.is_calver() == current.is_calver())
        .filter(|candidate| in_scope(&current, candidate, scope))
        .filter(|candidate| less_than(&current, candidate))
        .collect();

    matches.sort_by(|a, b| b.cmp(a));
    matches.into_iter().map(|v| v.raw).collect()
}

/// Unscoped version of [`newer_versions_scoped`], except for the implicit
/// `Scope::Default` narrowing driven by the current tag's own precision.
pub fn newer_versions(current: &str, tags: &[String]) -> Vec<String> {
    newer_versions_scoped(current, tags, Scope::Default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_v_prefixed_prerelease() {
        let v = parse("v1.2.3-rc1").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.pre, "rc1");
        assert_eq!(v.raw, "v1.2.3-rc1");
    }

    #[test]
    fn parse_latest_fails() {
        assert!(parse("latest").is_err());
        assert!(parse("alpine").is_err());
    }

    #[test]
    fn trichotomy_holds() {
        let a = parse("1.2.3").unwrap();
        let b = parse("1.2.4").unwrap();
        assert!(less_than(&a, &b));
        assert!(!less_than(&b, &a));
        assert_ne!(a, b);
    }

    #[test]
    fn release_beats_same_numeric_prerelease() {
        let pre = parse("1.2.3-rc1").unwrap();
        let release = parse("1.2.3").unwrap();
        assert!(less_than(&pre, &release));
        assert!(!less_than(&release, &pre));
    }

    #[test]
    fn newer_versions_scenario_one() {
        let tags = strs(&[
            "1.23.0", "1.24.0", "1.25.0", "1.25.1", "1.26.0", "latest", "alpine", "v1.27.0",
            "1.20.0",
        ]);
        let result = newer_versions("1.25", &tags);
        assert_eq!(result, vec!["v1.27.0", "1.26.0", "1.25.1"]);
    }

    #[test]
    fn newer_versions_scenario_calver_excluded() {
        let tags = strs(&["3.20", "3.22", "2021.12.14", "2021.11.27", "2022.01.05"]);
        let result = newer_versions("3.21", &tags);
        assert_eq!(result, vec!["3.22"]);
    }

    #[test]
    fn newer_versions_sorted_descending_and_strict() {
        let tags = strs(&["1.0.0", "1.0.1", "1.0.2", "0.9.0"]);
        let result = newer_versions_scoped("1.0.0", &tags, Scope::Major);
        assert_eq!(result, vec!["1.0.2", "1.0.1"]);
    }

    #[test]
    fn scope_patch_restricts_to_same_minor() {
        let tags = strs(&["1.2.0", "1.2.9", "1.3.0", "2.0.0"]);
        let result = newer_versions_scoped("1.2.1", &tags, Scope::Patch);
        assert_eq!(result, vec!["1.2.9"]);
    }

    #[test]
    fn scope_minor_restricts_to_same_major() {
        let tags = strs(&["1.2.0", "1.9.0", "2.0.0"]);
        let result = newer_versions_scoped("1.2.1", &tags, Scope::Minor);
        assert_eq!(result, vec!["1.9.0"]);
    }
}
