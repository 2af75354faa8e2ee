//! Snapshot/patch version history for JSON documents.
//!
//! Layouts and plugin sources are both stored as a [`Document`]: a map from
//! key (slot id, plugin file path) to JSON value. Each save becomes a
//! numbered version. Every `interval` versions a full snapshot is stored;
//! versions in between hold a [`Patch`] against their predecessor. Any
//! version can be reconstructed from the nearest snapshot at or below it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A versioned JSON document.
pub type Document = BTreeMap<String, Value>;

/// Errors from patch application and version reconstruction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The requested version is not in the history.
    #[error("version {0} not found")]
    NotFound(i32),
    /// No snapshot exists at or below the requested version.
    #[error("no snapshot at or below version {0}")]
    MissingSnapshot(i32),
    /// A version between the snapshot and the target is missing.
    #[error("version {0} is missing from the history")]
    Gap(i32),
    /// A patch does not match the document it is applied to.
    #[error("patch conflict on key '{0}'")]
    PatchConflict(String),
    /// A stored payload could not be decoded.
    #[error("malformed payload for version {version}: {reason}")]
    Malformed {
        /// Version with the bad payload.
        version: i32,
        /// Decoder message.
        reason: String,
    },
}

/// One key-level change between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    Added {
        key: String,
        value: Value,
    },
    Removed {
        key: String,
        previous: Value,
    },
    Modified {
        key: String,
        previous: Value,
        value: Value,
    },
}

impl Change {
    /// The key this change touches.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Modified { key, .. } => key,
        }
    }
}

/// The difference between two documents, ordered by key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Patch {
    pub changes: Vec<Change>,
}

impl Patch {
    /// Whether the two documents were identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Counts of (added, removed, modified) keys.
    #[must_use]
    pub fn summary(&self) -> (usize, usize, usize) {
        self.changes
            .iter()
            .fold((0, 0, 0), |(a, r, m), change| match change {
                Change::Added { .. } => (a + 1, r, m),
                Change::Removed { .. } => (a, r + 1, m),
                Change::Modified { .. } => (a, r, m + 1),
            })
    }
}

/// Compute the patch that turns `from` into `to`.
#[must_use]
pub fn diff(from: &Document, to: &Document) -> Patch {
    let mut changes = Vec::new();
    for (key, previous) in from {
        match to.get(key) {
            None => changes.push(Change::Removed {
                key: key.clone(),
                previous: previous.clone(),
            }),
            Some(value) if value != previous => changes.push(Change::Modified {
                key: key.clone(),
                previous: previous.clone(),
                value: value.clone(),
            }),
            Some(_) => {}
        }
    }
    for (key, value) in to {
        if !from.contains_key(key) {
            changes.push(Change::Added {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }
    changes.sort_by(|a, b| a.key().cmp(b.key()));
    Patch { changes }
}

/// Apply `patch` to `doc`, checking that recorded previous values match.
///
/// # Errors
///
/// Returns `VersionError::PatchConflict` when the document does not hold the
/// state the patch was computed against.
pub fn apply(doc: &Document, patch: &Patch) -> Result<Document, VersionError> {
    let mut next = doc.clone();
    for change in &patch.changes {
        match change {
            Change::Added { key, value } => {
                if next.contains_key(key) {
                    return Err(VersionError::PatchConflict(key.clone()));
                }
                next.insert(key.clone(), value.clone());
            }
            Change::Removed { key, previous } => {
                if next.get(key) != Some(previous) {
                    return Err(VersionError::PatchConflict(key.clone()));
                }
                next.remove(key);
            }
            Change::Modified {
                key,
                previous,
                value,
            } => {
                if next.get(key) != Some(previous) {
                    return Err(VersionError::PatchConflict(key.clone()));
                }
                next.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(next)
}

/// How often a full snapshot is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPolicy {
    /// Versions per snapshot; clamped to at least 1.
    pub interval: u32,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self { interval: 10 }
    }
}

impl SnapshotPolicy {
    /// Create a policy; an interval of 0 is treated as 1 (always snapshot).
    #[must_use]
    pub const fn new(interval: u32) -> Self {
        Self {
            interval: if interval == 0 { 1 } else { interval },
        }
    }

    /// Whether version `number` (1-based) is stored as a snapshot.
    #[must_use]
    pub fn is_snapshot(&self, number: i32) -> bool {
        if number <= 1 {
            return true;
        }
        let interval = i64::from(self.interval.max(1));
        (i64::from(number) - 1) % interval == 0
    }
}

/// Storage kind of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shopforge.version_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum VersionKind {
    Snapshot,
    Patch,
}

/// A version as stored: number, kind, and JSON payload.
///
/// Snapshot payloads are a [`Document`]; patch payloads are a [`Patch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVersion {
    pub number: i32,
    pub kind: VersionKind,
    pub payload: Value,
}

impl StoredVersion {
    fn document(&self) -> Result<Document, VersionError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| VersionError::Malformed {
            version: self.number,
            reason: e.to_string(),
        })
    }

    fn patch(&self) -> Result<Patch, VersionError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| VersionError::Malformed {
            version: self.number,
            reason: e.to_string(),
        })
    }
}

/// Build the stored form of version `number`.
///
/// `previous` is the reconstructed document of version `number - 1` (ignored
/// when the policy calls for a snapshot).
#[must_use]
pub fn next_version(
    policy: SnapshotPolicy,
    number: i32,
    previous: Option<&Document>,
    current: &Document,
) -> StoredVersion {
    match previous {
        Some(previous) if !policy.is_snapshot(number) => StoredVersion {
            number,
            kind: VersionKind::Patch,
            payload: serde_json::to_value(diff(previous, current)).unwrap_or(Value::Null),
        },
        _ => StoredVersion {
            number,
            kind: VersionKind::Snapshot,
            payload: Value::Object(current.clone().into_iter().collect()),
        },
    }
}

/// Reconstruct the document at version `target`.
///
/// `versions` may be in any order and may include versions above `target`.
///
/// # Errors
///
/// Returns `VersionError` if the target is unknown, no snapshot precedes it,
/// a version is missing in between, or a patch does not apply.
pub fn reconstruct(versions: &[StoredVersion], target: i32) -> Result<Document, VersionError> {
    let by_number: BTreeMap<i32, &StoredVersion> =
        versions.iter().map(|v| (v.number, v)).collect();

    if !by_number.contains_key(&target) {
        return Err(VersionError::NotFound(target));
    }

    let base = by_number
        .range(..=target)
        .rev()
        .find(|(_, v)| v.kind == VersionKind::Snapshot)
        .map(|(n, v)| (*n, *v))
        .ok_or(VersionError::MissingSnapshot(target))?;

    let mut doc = base.1.document()?;
    for number in (base.0 + 1)..=target {
        let version = by_number.get(&number).ok_or(VersionError::Gap(number))?;
        doc = match version.kind {
            VersionKind::Snapshot => version.document()?,
            VersionKind::Patch => apply(&doc, &version.patch()?)?,
        };
    }
    Ok(doc)
}

/// The patch between versions `from` and `to`.
///
/// # Errors
///
/// Returns `VersionError` if either version cannot be reconstructed.
pub fn compare(versions: &[StoredVersion], from: i32, to: i32) -> Result<Patch, VersionError> {
    let a = reconstruct(versions, from)?;
    let b = reconstruct(versions, to)?;
    Ok(diff(&a, &b))
}
