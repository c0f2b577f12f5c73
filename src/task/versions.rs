//! Append-only rubric version list.
//!
//! # Invariants
//! - versions are exactly `1..=len`, in order
//! - an existing version's content is never replaced

use serde::{Deserialize, Serialize};
use thiserror::Error;

const FIELD_PREFIX: &str = "Rubric_V";

/// Record-store field name holding rubric `version`.
pub fn rubric_field_name(version: u32) -> String {
    format!("{}{}", FIELD_PREFIX, version)
}

/// Inverse of [`rubric_field_name`].
pub fn parse_rubric_field_name(name: &str) -> Option<u32> {
    name.strip_prefix(FIELD_PREFIX)
        .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
        .filter(|v| *v >= 1)
}

/// Immutable snapshot of one rubric version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricVersion {
    pub version: u32,
    /// The rubric JSON document as submitted.
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Rubric version {got} cannot be added; next version is {expected}")]
    OutOfOrder { expected: u32, got: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RubricVersions(Vec<RubricVersion>);

impl RubricVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored snapshots in any order.
    pub fn from_snapshots(mut snapshots: Vec<RubricVersion>) -> Result<Self, VersionError> {
        snapshots.sort_by_key(|s| s.version);
        let mut versions = Self::new();
        for snapshot in snapshots {
            versions.push(snapshot)?;
        }
        Ok(versions)
    }

    /// Version number the next append must use.
    pub fn next_version(&self) -> u32 {
        self.0.len() as u32 + 1
    }

    pub fn latest(&self) -> Option<&RubricVersion> {
        self.0.last()
    }

    pub fn get(&self, version: u32) -> Option<&RubricVersion> {
        version
            .checked_sub(1)
            .and_then(|index| self.0.get(index as usize))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RubricVersion> {
        self.0.iter()
    }

    /// Append `content` as `version`, which must be the next version.
    pub fn append(
        &mut self,
        version: u32,
        content: impl Into<String>,
        created_at: impl Into<String>,
    ) -> Result<&RubricVersion, VersionError> {
        self.push(RubricVersion {
            version,
            content: content.into(),
            created_at: created_at.into(),
        })?;
        Ok(&self.0[self.0.len() - 1])
    }

    fn push(&mut self, snapshot: RubricVersion) -> Result<(), VersionError> {
        let expected = self.next_version();
        if snapshot.version != expected {
            return Err(VersionError::OutOfOrder {
                expected,
                got: snapshot.version,
            });
        }
        self.0.push(snapshot);
        Ok(())
    }
}
