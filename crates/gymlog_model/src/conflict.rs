//! Merge conflicts and their resolutions.

use crate::exercise::Exercise;
use crate::kind::{EntityKind, Record};
use crate::measurement::MeasurementSet;
use crate::staged::Staged;
use crate::workout::Workout;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An entity changed both locally and remotely in different ways.
///
/// `original` is the canonical copy both sides started from, `Deleted` if
/// there was none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound = "")]
pub struct Conflict<T: Record> {
    /// Identity of the entity.
    pub id: T::Id,
    /// Canonical copy before the merge.
    pub original: Staged<T>,
    /// The server's copy.
    pub remote: Staged<T>,
    /// The local staged copy.
    pub local: Staged<T>,
}

/// A conflict of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeConflict {
    /// A measurement set conflict.
    MeasurementSet(Conflict<MeasurementSet>),
    /// A workout conflict.
    Workout(Conflict<Workout>),
    /// An exercise conflict.
    Exercise(Conflict<Exercise>),
}

impl MergeConflict {
    /// Kind of the conflicting entity.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::MeasurementSet(_) => EntityKind::MeasurementSet,
            Self::Workout(_) => EntityKind::Workout,
            Self::Exercise(_) => EntityKind::Exercise,
        }
    }

    /// Storage key of the conflicting entity.
    pub fn key(&self) -> String {
        match self {
            Self::MeasurementSet(c) => c.id.to_string(),
            Self::Workout(c) => c.id.to_string(),
            Self::Exercise(c) => c.id.to_string(),
        }
    }
}

/// Which side wins a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the local staged change; it will be uploaded later.
    Local,
    /// Take the server's copy and drop the local change.
    Remote,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Resolutions keyed by entity key.
///
/// Keys of different kinds cannot collide: dates, UUIDs and composite ids
/// have distinct shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolutions(BTreeMap<String, Resolution>);

impl Resolutions {
    /// No resolutions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the resolution for the entity whose key is `key`.
    pub fn insert(&mut self, key: impl Into<String>, resolution: Resolution) {
        self.0.insert(key.into(), resolution);
    }

    /// Builder form of [`Resolutions::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, resolution: Resolution) -> Self {
        self.insert(key, resolution);
        self
    }

    /// Resolves every conflict the same way.
    pub fn all(conflicts: &[MergeConflict], resolution: Resolution) -> Self {
        conflicts
            .iter()
            .map(|c| (c.key(), resolution))
            .collect()
    }

    /// Looks up a resolution.
    pub fn get(&self, key: &str) -> Option<Resolution> {
        self.0.get(key).copied()
    }

    /// Returns true if every conflict has a resolution.
    pub fn covers(&self, conflicts: &[MergeConflict]) -> bool {
        conflicts.iter().all(|c| self.0.contains_key(&c.key()))
    }

    /// Number of resolutions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are none.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over key and resolution pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Resolution)> {
        self.0.iter().map(|(k, r)| (k.as_str(), *r))
    }
}

impl FromIterator<(String, Resolution)> for Resolutions {
    fn from_iter<I: IntoIterator<Item = (String, Resolution)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, Resolution)> for Resolutions {
    fn extend<I: IntoIterator<Item = (String, Resolution)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}
