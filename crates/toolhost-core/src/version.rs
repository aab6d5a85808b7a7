use std::{fmt, str::FromStr};

use semver::{Comparator, Op, Prerelease};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// Strict `major.minor.patch` version. No pre-release or build metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidVersion {
            input: input.to_string(),
        };
        let mut parts = input.split('.');
        let mut next = || parts.next().ok_or_else(invalid).and_then(parse_component);
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

fn parse_component(part: &str) -> Result<u64, ParseError> {
    let digits_only = !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let leading_zero = part.len() > 1 && part.starts_with('0');
    if !digits_only || leading_zero {
        return Err(ParseError::InvalidComponent {
            component: part.to_string(),
        });
    }
    part.parse().map_err(|_| ParseError::InvalidComponent {
        component: part.to_string(),
    })
}

impl FromStr for SemanticVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<SemanticVersion> for semver::Version {
    fn from(v: SemanticVersion) -> Self {
        semver::Version::new(v.major, v.minor, v.patch)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Conjunction of comparator clauses, e.g. `>=1.2.0,<2.0.0`. Empty means "any".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionConstraint {
    clauses: Vec<Comparator>,
}

impl VersionConstraint {
    pub fn any() -> Self {
        Self::default()
    }

    /// `None` or blank input yields a constraint that matches everything.
    pub fn parse(input: Option<&str>) -> Result<Self, ParseError> {
        let Some(raw) = input.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Ok(Self::any());
        };
        let clauses = raw
            .split(',')
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clauses })
    }

    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, version: &SemanticVersion) -> bool {
        let version = semver::Version::from(*version);
        self.clauses.iter().all(|clause| clause.matches(&version))
    }
}

fn parse_clause(clause: &str) -> Result<Comparator, ParseError> {
    let clause = clause.trim();
    if clause.is_empty() {
        return Err(ParseError::EmptyClause);
    }
    let split = clause
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(clause.len());
    let (operator, rest) = clause.split_at(split);
    let op = match operator.trim() {
        "" | "=" | "==" => Op::Exact,
        ">=" => Op::GreaterEq,
        ">" => Op::Greater,
        "<=" => Op::LessEq,
        "<" => Op::Less,
        "^" => Op::Caret,
        "~" => Op::Tilde,
        other => {
            return Err(ParseError::UnknownOperator {
                operator: other.to_string(),
                clause: clause.to_string(),
            })
        }
    };
    let version = SemanticVersion::parse(rest.trim())?;
    Ok(Comparator {
        op,
        major: version.major,
        minor: Some(version.minor),
        patch: Some(version.patch),
        pre: Prerelease::EMPTY,
    })
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("*");
        }
        let rendered = self
            .clauses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        f.write_str(&rendered.join(","))
    }
}
