//! Semantic version parsing and comparison.
//!
//! Feed manifests and release tags carry versions as strings ("1.2.3",
//! "v1.2.3-beta.2"). The check step parses them here to decide whether a
//! published build is newer than the running one.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};

/// A semantic version with an optional pre-release tag.
///
/// Pre-release identifiers are kept as raw strings and compared segment by
/// segment, with numeric segments compared as numbers. That covers the
/// common `alpha.N` / `beta.N` / `rc.N` schemes (`beta.2 < beta.10`,
/// `alpha.1 < beta.1`) without a full semver grammar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
    /// Patch version number.
    pub patch: u32,
    /// Optional pre-release identifier (e.g. "beta.1").
    pub pre_release: Option<String>,
}

impl Version {
    /// Create a new stable version.
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
        }
    }

    /// Create a version with a pre-release tag.
    #[must_use]
    pub fn with_pre_release(major: u32, minor: u32, patch: u32, pre: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: Some(pre.into()),
        }
    }

    /// The version of the running application, taken from Cargo metadata.
    #[must_use]
    pub fn current() -> Self {
        Self::from_str(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Self::new(0, 0, 0))
    }

    /// Whether this is a stable release (no pre-release tag).
    #[must_use]
    pub fn is_stable(&self) -> bool {
        self.pre_release.is_none()
    }

    /// Parse a version from a release tag, tolerating a leading `v`.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Self::from_str(tag)
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);

        let (version_part, pre_release) = match s.split_once('-') {
            Some((v, p)) if !p.is_empty() => (v, Some(p.to_string())),
            Some((v, _)) => (v, None),
            None => (s, None),
        };

        let parts: Vec<&str> = version_part.split('.').collect();
        if parts.len() != 3 {
            return Err(UpdateError::InvalidVersion(s.to_string()));
        }

        let parse = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| UpdateError::InvalidVersion(s.to_string()))
        };

        Ok(Self {
            major: parse(parts[0])?,
            minor: parse(parts[1])?,
            patch: parse(parts[2])?,
            pre_release,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = UpdateError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_str(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.pre_release {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // A pre-release sorts below its corresponding stable release,
        // e.g. 1.2.0-beta.1 < 1.2.0
        match (&self.pre_release, &other.pre_release) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_pre_release(a, b),
        }
    }
}

/// Compare pre-release tags segment by segment. Numeric segments compare
/// as numbers, so `beta.9 < beta.10`; numeric segments sort below
/// alphanumeric ones; a tag that is a prefix of another sorts first.
fn compare_pre_release(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        let ord = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match (x.parse::<u64>(), y.parse::<u64>()) {
                (Ok(m), Ok(n)) => m.cmp(&n),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => x.cmp(y),
            },
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stable_version() {
        let v = Version::from_str("1.2.3").unwrap();
        assert_eq!(v, Version::new(1, 2, 3));
        assert!(v.is_stable());
    }

    #[test]
    fn test_parse_tag_with_v_prefix() {
        let v = Version::from_tag("v2.0.1").unwrap();
        assert_eq!(v, Version::new(2, 0, 1));
    }

    #[test]
    fn test_parse_pre_release() {
        let v = Version::from_str("1.0.0-beta.2").unwrap();
        assert_eq!(v.pre_release.as_deref(), Some("beta.2"));
        assert!(!v.is_stable());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Version::from_str("1.2").is_err());
        assert!(Version::from_str("1.2.3.4").is_err());
        assert!(Version::from_str("a.b.c").is_err());
        assert!(Version::from_str("").is_err());
    }

    #[test]
    fn test_ordering() {
        let parse = |s| Version::from_str(s).unwrap();
        assert!(parse("1.0.0") < parse("1.0.1"));
        assert!(parse("1.0.9") < parse("1.1.0"));
        assert!(parse("1.9.9") < parse("2.0.0"));
        assert_eq!(parse("1.2.3"), parse("v1.2.3"));
    }

    #[test]
    fn test_pre_release_sorts_below_stable() {
        let parse = |s| Version::from_str(s).unwrap();
        assert!(parse("1.0.0-beta.1") < parse("1.0.0"));
        assert!(parse("1.0.0-alpha.1") < parse("1.0.0-beta.1"));
        assert!(parse("0.9.9") < parse("1.0.0-beta.1"));
    }

    #[test]
    fn test_multi_digit_pre_release_ordering() {
        let parse = |s| Version::from_str(s).unwrap();
        // Numeric segments must not be compared as strings.
        assert!(parse("1.0.0-beta.9") < parse("1.0.0-beta.10"));
        assert!(parse("1.0.0-rc.2") < parse("1.0.0-rc.11"));
        assert!(parse("1.0.0-beta.10") < parse("1.0.0-rc.1"));
        assert!(parse("1.0.0-beta") < parse("1.0.0-beta.1"));
        assert_eq!(parse("1.0.0-beta.2"), parse("1.0.0-beta.2"));
    }

    #[test]
    fn test_display_round_trip() {
        let v = Version::with_pre_release(1, 2, 3, "rc.1");
        assert_eq!(v.to_string(), "1.2.3-rc.1");
        assert_eq!(Version::from_str(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn test_serde_as_string() {
        let v: Version = serde_json::from_str("\"1.4.2-beta.3\"").unwrap();
        assert_eq!(v, Version::with_pre_release(1, 4, 2, "beta.3"));

        let json = serde_json::to_string(&Version::new(2, 0, 0)).unwrap();
        assert_eq!(json, "\"2.0.0\"");
    }

    #[test]
    fn test_current_version_parses() {
        // Whatever the crate version is, it must parse cleanly.
        assert!(Version::from_str(env!("CARGO_PKG_VERSION")).is_ok());
    }
}
