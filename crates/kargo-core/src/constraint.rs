//! Semantic version parsing and constraints
//!
//! Tags found in the wild are rarely strict SemVer: `v1.2`, `1.4` and
//! `v2.0.0-rc.1` are all common. Versions are therefore parsed leniently
//! (optional `v` prefix, missing minor/patch read as zero), and constraints
//! accept the usual range syntax on top of what `semver::VersionReq` parses:
//! `||` alternatives, space-separated comparators, hyphen ranges and `!=`
//! exclusions.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version, VersionReq};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

static LENIENT_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[vV]?([0-9]+)(\.[0-9]+)?(\.[0-9]+)?(-([0-9A-Za-z\-]+(\.[0-9A-Za-z\-]+)*))?(\+([0-9A-Za-z\-]+(\.[0-9A-Za-z\-]+)*))?$",
    )
    .expect("lenient version pattern is valid")
});

static HYPHEN_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\S+)\s+-\s+(\S+)\s*$").expect("hyphen range pattern is valid")
});

/// Parse a version string leniently; `None` if it is not a version at all
pub fn parse_version_lenient(raw: &str) -> Option<Version> {
    let caps = LENIENT_VERSION.captures(raw.trim())?;

    let number = |idx: usize| -> Option<u64> {
        match caps.get(idx) {
            Some(m) => m.as_str().trim_start_matches('.').parse().ok(),
            None => Some(0),
        }
    };

    let pre = match caps.get(5) {
        Some(m) => Prerelease::new(m.as_str()).ok()?,
        None => Prerelease::EMPTY,
    };
    let build = match caps.get(8) {
        Some(m) => BuildMetadata::new(m.as_str()).ok()?,
        None => BuildMetadata::EMPTY,
    };

    Some(Version {
        major: number(1)?,
        minor: number(2)?,
        patch: number(3)?,
        pre,
        build,
    })
}

/// A parsed version constraint, e.g. `^1.2 || >=3.0.0 <4`
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    raw: String,
    alternatives: Vec<Alternative>,
}

/// One `||`-separated branch: a requirement minus excluded versions
#[derive(Debug, Clone)]
struct Alternative {
    req: VersionReq,
    excluded: Vec<VersionReq>,
}

impl Alternative {
    fn matches(&self, version: &Version) -> bool {
        self.req.matches(version) && !self.excluded.iter().any(|ex| ex.matches(version))
    }
}

/// Comparators of one alternative, split into `VersionReq` syntax
#[derive(Debug, Default)]
struct Comparators {
    required: Vec<String>,
    excluded: Vec<String>,
}

impl VersionConstraint {
    /// Parse a constraint string
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |message: String| CoreError::InvalidConstraint {
            constraint: raw.to_string(),
            message,
        };

        if raw.trim().is_empty() {
            return Err(invalid("constraint is empty".to_string()));
        }

        let mut alternatives = Vec::new();
        for part in raw.split("||") {
            let comparators = normalize_comparators(part)
                .ok_or_else(|| invalid(format!("empty alternative in '{}'", raw)))?;
            let req = if comparators.required.is_empty() {
                VersionReq::STAR
            } else {
                VersionReq::parse(&comparators.required.join(", "))
                    .map_err(|e| invalid(e.to_string()))?
            };
            let excluded = comparators
                .excluded
                .iter()
                .map(|ex| VersionReq::parse(ex).map_err(|e| invalid(e.to_string())))
                .collect::<Result<Vec<_>>>()?;
            alternatives.push(Alternative { req, excluded });
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// Whether `version` satisfies any alternative
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(version))
    }

    /// The constraint as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for VersionConstraint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Rewrite one `||`-free alternative into `VersionReq` syntax
fn normalize_comparators(part: &str) -> Option<Comparators> {
    if let Some(caps) = HYPHEN_RANGE.captures(part) {
        return Some(Comparators {
            required: vec![
                format!(">={}", strip_v(&caps[1])),
                format!("<={}", strip_v(&caps[2])),
            ],
            excluded: Vec::new(),
        });
    }

    let mut comparators = Comparators::default();
    let mut pending_op = String::new();
    for token in part
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let op_len = token
            .find(|c: char| !matches!(c, '=' | '<' | '>' | '~' | '^' | '!'))
            .unwrap_or(token.len());
        let (op, version) = token.split_at(op_len);
        pending_op.push_str(op);
        if version.is_empty() {
            continue;
        }

        let version = strip_v(version);
        let op = std::mem::take(&mut pending_op);
        let is_wildcard = version == "*" || version.contains(['x', 'X', '*']);
        if op == "!=" {
            comparators.excluded.push(format!("={}", version));
        } else if op.is_empty() && !is_wildcard {
            // A bare version means exactly that version
            comparators.required.push(format!("={}", version));
        } else {
            comparators.required.push(format!("{}{}", op, version));
        }
    }

    if !pending_op.is_empty() {
        comparators.required.push(pending_op);
    }
    if comparators.required.is_empty() && comparators.excluded.is_empty() {
        None
    } else {
        Some(comparators)
    }
}

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> Version {
        parse_version_lenient(raw).unwrap()
    }

    #[test]
    fn test_lenient_parse() {
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("v1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("v2"), Version::new(2, 0, 0));
        assert_eq!(v("1.0.0-rc.1").pre.as_str(), "rc.1");
        assert_eq!(v("1.0.0+build.5").build.as_str(), "build.5");
    }

    #[test]
    fn test_lenient_parse_rejects_garbage() {
        assert!(parse_version_lenient("latest").is_none());
        assert!(parse_version_lenient("1.2.3.4").is_none());
        assert!(parse_version_lenient("").is_none());
        assert!(parse_version_lenient("main-abc123").is_none());
    }

    #[test]
    fn test_caret_constraint() {
        let c = VersionConstraint::parse("^1.2.0").unwrap();
        assert!(c.matches(&v("1.2.0")));
        assert!(c.matches(&v("1.9.9")));
        assert!(!c.matches(&v("2.0.0")));
        assert!(!c.matches(&v("1.1.0")));
    }

    #[test]
    fn test_space_separated_range() {
        let c = VersionConstraint::parse(">= 1.2, < 2").unwrap();
        assert!(c.matches(&v("1.5.0")));
        assert!(!c.matches(&v("2.0.0")));

        let c = VersionConstraint::parse(">=1.2 <2").unwrap();
        assert!(c.matches(&v("1.2.0")));
        assert!(!c.matches(&v("1.1.9")));
    }

    #[test]
    fn test_alternatives() {
        let c = VersionConstraint::parse("^1.0.0 || ^3.0.0").unwrap();
        assert!(c.matches(&v("1.4.0")));
        assert!(c.matches(&v("3.1.0")));
        assert!(!c.matches(&v("2.0.0")));
    }

    #[test]
    fn test_hyphen_range() {
        let c = VersionConstraint::parse("1.2.0 - 1.4.0").unwrap();
        assert!(c.matches(&v("1.3.7")));
        assert!(c.matches(&v("1.4.0")));
        assert!(!c.matches(&v("1.4.1")));
    }

    #[test]
    fn test_bare_version_is_exact() {
        let c = VersionConstraint::parse("v1.2.3").unwrap();
        assert!(c.matches(&v("1.2.3")));
        assert!(!c.matches(&v("1.2.4")));
    }

    #[test]
    fn test_wildcards() {
        let c = VersionConstraint::parse("1.x").unwrap();
        assert!(c.matches(&v("1.7.0")));
        assert!(!c.matches(&v("2.0.0")));
    }

    #[test]
    fn test_not_equal() {
        let c = VersionConstraint::parse("!=1.2.3").unwrap();
        assert!(!c.matches(&v("1.2.3")));
        assert!(c.matches(&v("1.2.4")));
        assert!(c.matches(&v("0.1.0")));

        let c = VersionConstraint::parse(">=1.0 <2.0 !=1.5.0").unwrap();
        assert!(c.matches(&v("1.4.0")));
        assert!(c.matches(&v("1.5.1")));
        assert!(!c.matches(&v("1.5.0")));
        assert!(!c.matches(&v("2.0.0")));

        let c = VersionConstraint::parse("^1.0 != 1.3 || 3.0.0").unwrap();
        assert!(!c.matches(&v("1.3.2")));
        assert!(c.matches(&v("1.4.0")));
        assert!(c.matches(&v("3.0.0")));
    }

    #[test]
    fn test_invalid_constraints() {
        assert!(VersionConstraint::parse("").is_err());
        assert!(VersionConstraint::parse("not a constraint").is_err());
        assert!(VersionConstraint::parse("^1.0 ||").is_err());
        assert!(VersionConstraint::parse("!1.0.0").is_err());
        assert!(VersionConstraint::parse(">=1.0 !=").is_err());
    }
}
