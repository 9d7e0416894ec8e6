//! Formulation ledger: versioned, effective-dated compositions of compound
//! ingredients, owned by a supplier
//!
//! Versions are append-only. For one (supplier, compound) the effective
//! windows of distinct versions never overlap, so at most one version is
//! active on any date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{DateRange, IngredientId};

/// One atomic ingredient of a formulation, per pack unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormulationLine {
    pub atomic_ingredient_id: IngredientId,
    pub quantity: Decimal,
}

/// A single immutable formulation version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formulation {
    pub id: Uuid,
    pub compound_id: IngredientId,
    pub supplier_id: String,
    pub version: i32,
    pub effective: DateRange,
    pub unit_price: Decimal,
    pub pack_size: Decimal,
    pub lines: Vec<FormulationLine>,
}

impl Formulation {
    pub fn window(&self) -> VersionWindow {
        VersionWindow {
            version: self.version,
            effective: self.effective,
        }
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.effective.contains(date)
    }
}

/// Version number and effective window of an existing formulation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionWindow {
    pub version: i32,
    pub effective: DateRange,
}

/// Formulation authoring errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulationError {
    #[error("effective range {requested} overlaps version {version} {existing}")]
    Overlap {
        version: i32,
        existing: DateRange,
        requested: DateRange,
    },

    #[error("effective start {start} is after effective end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

/// Next version number for a (supplier, compound): `max(existing) + 1`
pub fn next_version(existing: &[VersionWindow]) -> i32 {
    existing.iter().map(|w| w.version).max().unwrap_or(0) + 1
}

/// Reject a requested window that overlaps any existing version
pub fn check_no_overlap(
    existing: &[VersionWindow],
    requested: &DateRange,
) -> Result<(), FormulationError> {
    match existing.iter().find(|w| w.effective.overlaps(requested)) {
        Some(clash) => Err(FormulationError::Overlap {
            version: clash.version,
            existing: clash.effective,
            requested: *requested,
        }),
        None => Ok(()),
    }
}

/// Build the effective window, rejecting `start > end`
pub fn effective_range(start: NaiveDate, end: NaiveDate) -> Result<DateRange, FormulationError> {
    DateRange::new(start, end).ok_or(FormulationError::InvalidRange { start, end })
}

/// The version whose window contains `date`, if any
pub fn active_window(existing: &[VersionWindow], date: NaiveDate) -> Option<&VersionWindow> {
    existing.iter().find(|w| w.effective.contains(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window(version: i32, start: NaiveDate, end: NaiveDate) -> VersionWindow {
        VersionWindow {
            version,
            effective: DateRange::new(start, end).unwrap(),
        }
    }

    #[test]
    fn test_next_version_starts_at_one() {
        assert_eq!(next_version(&[]), 1);
    }

    #[test]
    fn test_next_version_uses_max_not_count() {
        let existing = vec![
            window(1, d(2023, 1, 1), d(2023, 6, 30)),
            window(4, d(2024, 1, 1), d(2024, 6, 30)),
        ];
        assert_eq!(next_version(&existing), 5);
    }

    #[test]
    fn test_overlap_reports_clashing_version() {
        let existing = vec![window(1, d(2024, 1, 1), d(2024, 6, 30))];
        let requested = DateRange::new(d(2024, 6, 30), d(2024, 12, 31)).unwrap();
        match check_no_overlap(&existing, &requested) {
            Err(FormulationError::Overlap { version, .. }) => assert_eq!(version, 1),
            other => panic!("expected overlap, got {:?}", other),
        }
    }

    #[test]
    fn test_effective_range_rejects_inverted() {
        assert!(matches!(
            effective_range(d(2024, 2, 1), d(2024, 1, 1)),
            Err(FormulationError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_active_window() {
        let existing = vec![
            window(1, d(2024, 1, 1), d(2024, 6, 30)),
            window(2, d(2024, 7, 1), d(2024, 12, 31)),
        ];
        assert_eq!(active_window(&existing, d(2024, 7, 1)).map(|w| w.version), Some(2));
        assert_eq!(active_window(&existing, d(2024, 6, 30)).map(|w| w.version), Some(1));
        assert!(active_window(&existing, d(2025, 1, 1)).is_none());
    }
}
