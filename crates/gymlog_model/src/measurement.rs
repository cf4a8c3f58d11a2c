//! Body measurements.

use crate::error::{ModelError, ModelResult};
use crate::kind::{EntityKind, Record};
use crate::staged::{Staged, StagedPayload};
use crate::{Conflict, MergeConflict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What a single measurement value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementType {
    /// Body weight.
    Weight,
    /// Body height.
    Height,
    /// Right upper arm circumference.
    ArmRightUpper,
    /// Right forearm circumference.
    ArmRightLower,
    /// Left upper arm circumference.
    ArmLeftUpper,
    /// Left forearm circumference.
    ArmLeftLower,
    /// Right thigh circumference.
    LegRightUpper,
    /// Right calf circumference.
    LegRightLower,
    /// Left thigh circumference.
    LegLeftUpper,
    /// Left calf circumference.
    LegLeftLower,
}

impl MeasurementType {
    /// Every measurement type, in declaration order.
    pub const ALL: [MeasurementType; 10] = [
        Self::Weight,
        Self::Height,
        Self::ArmRightUpper,
        Self::ArmRightLower,
        Self::ArmLeftUpper,
        Self::ArmLeftLower,
        Self::LegRightUpper,
        Self::LegRightLower,
        Self::LegLeftUpper,
        Self::LegLeftLower,
    ];

    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Height => "height",
            Self::ArmRightUpper => "arm-right-upper",
            Self::ArmRightLower => "arm-right-lower",
            Self::ArmLeftUpper => "arm-left-upper",
            Self::ArmLeftLower => "arm-left-lower",
            Self::LegRightUpper => "leg-right-upper",
            Self::LegRightLower => "leg-right-lower",
            Self::LegLeftUpper => "leg-left-upper",
            Self::LegLeftLower => "leg-left-lower",
        }
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementType {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ModelError::UnknownType {
                kind: "measurement",
                value: s.to_string(),
            })
    }
}

/// A calendar date in `YYYY-MM-DD` form.
///
/// The textual form sorts the same way as the dates themselves, so it is
/// used directly as the storage key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeasurementDate(String);

impl MeasurementDate {
    /// Validates and wraps a date string.
    pub fn parse(s: &str) -> ModelResult<Self> {
        let invalid = || ModelError::InvalidDate(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return Err(invalid());
        }
        let number = |range: std::ops::Range<usize>| -> ModelResult<u32> {
            let part = &s[range];
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let year = number(0..4)?;
        let month = number(5..7)?;
        let day = number(8..10)?;
        if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
            return Err(invalid());
        }
        Ok(Self(s.to_string()))
    }

    /// The date as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

impl fmt::Display for MeasurementDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MeasurementDate {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MeasurementDate {
    type Error = ModelError;

    fn try_from(value: String) -> ModelResult<Self> {
        Self::parse(&value)
    }
}

impl From<MeasurementDate> for String {
    fn from(date: MeasurementDate) -> Self {
        date.0
    }
}

/// Measurements recorded on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSet {
    /// Day of the measurements; also the identity.
    pub date: MeasurementDate,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Value per measurement type.
    #[serde(default)]
    pub measurements: BTreeMap<MeasurementType, f64>,
}

impl MeasurementSet {
    /// Creates an empty set for `date`.
    pub fn new(date: MeasurementDate) -> Self {
        Self {
            date,
            notes: String::new(),
            measurements: BTreeMap::new(),
        }
    }

    /// Adds or replaces one measurement.
    #[must_use]
    pub fn with(mut self, kind: MeasurementType, value: f64) -> Self {
        self.measurements.insert(kind, value);
        self
    }

    /// Replaces the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

impl Record for MeasurementSet {
    type Id = MeasurementDate;
    const KIND: EntityKind = EntityKind::MeasurementSet;

    fn id(&self) -> MeasurementDate {
        self.date.clone()
    }

    fn parse_id(key: &str) -> ModelResult<MeasurementDate> {
        MeasurementDate::parse(key)
    }

    fn same_content(&self, other: &Self) -> bool {
        self.notes == other.notes && self.measurements == other.measurements
    }

    fn staged_payload(id: MeasurementDate, value: Staged<Self>) -> StagedPayload {
        StagedPayload::MeasurementSet { date: id, value }
    }

    fn merge_conflict(conflict: Conflict<Self>) -> MergeConflict {
        MergeConflict::MeasurementSet(conflict)
    }
}
