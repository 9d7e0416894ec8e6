//! Formulation versioning tests
//!
//! Tests for supplier formulations including:
//! - Effective windows of one (supplier, compound) never overlap
//! - Version numbers increase by one from the highest existing
//! - The active version on a date

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use shared::{
    active_window, check_no_overlap, effective_range, next_version, DateRange, FormulationError, VersionWindow,
};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn window(version: i32, start: &str, end: &str) -> VersionWindow {
    VersionWindow {
        version,
        effective: DateRange::new(date(start), date(end)).unwrap(),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_first_version_is_one() {
        assert_eq!(next_version(&[]), 1);
    }

    /// Gaps in version history do not get filled
    #[test]
    fn test_next_version_after_highest() {
        let existing = vec![window(1, "2024-01-01", "2024-01-31"), window(4, "2024-03-01", "2024-03-31")];
        assert_eq!(next_version(&existing), 5);
    }

    /// Ranges are inclusive at both ends, so sharing an end day overlaps
    #[test]
    fn test_shared_boundary_day_overlaps() {
        let existing = vec![window(1, "2024-01-01", "2024-01-31")];
        let requested = effective_range(date("2024-01-31"), date("2024-02-29")).unwrap();

        let err = check_no_overlap(&existing, &requested).unwrap_err();
        assert_eq!(
            err,
            FormulationError::Overlap {
                version: 1,
                existing: existing[0].effective,
                requested,
            }
        );
    }

    #[test]
    fn test_adjacent_range_accepted() {
        let existing = vec![window(1, "2024-01-01", "2024-01-31")];
        let requested = effective_range(date("2024-02-01"), date("2024-02-29")).unwrap();
        assert!(check_no_overlap(&existing, &requested).is_ok());
    }

    #[test]
    fn test_single_day_range_allowed() {
        assert!(effective_range(date("2024-05-05"), date("2024-05-05")).is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert_eq!(
            effective_range(date("2024-02-01"), date("2024-01-01")).unwrap_err(),
            FormulationError::InvalidRange {
                start: date("2024-02-01"),
                end: date("2024-01-01"),
            }
        );
    }

    #[test]
    fn test_active_window() {
        let existing = vec![window(1, "2024-01-01", "2024-01-31"), window(2, "2024-02-01", "2024-02-29")];
        assert_eq!(active_window(&existing, date("2024-02-10")).map(|w| w.version), Some(2));
        assert_eq!(active_window(&existing, date("2024-01-31")).map(|w| w.version), Some(1));
        assert!(active_window(&existing, date("2024-03-01")).is_none());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn range_strategy() -> impl Strategy<Value = DateRange> {
        (0i64..365, 0i64..60).prop_map(|(offset, length)| {
            let start = date("2024-01-01") + Duration::days(offset);
            DateRange::new(start, start + Duration::days(length)).unwrap()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Accepting ranges one by one never yields two overlapping windows,
        /// and versions stay strictly increasing
        #[test]
        fn prop_accepted_windows_never_overlap(
            requests in prop::collection::vec(range_strategy(), 1..20),
        ) {
            let mut accepted: Vec<VersionWindow> = Vec::new();
            for requested in requests {
                if check_no_overlap(&accepted, &requested).is_ok() {
                    let version = next_version(&accepted);
                    if let Some(last) = accepted.last() {
                        prop_assert_eq!(version, last.version + 1);
                    }
                    accepted.push(VersionWindow { version, effective: requested });
                }
            }

            for (i, a) in accepted.iter().enumerate() {
                for b in &accepted[i + 1..] {
                    prop_assert!(!a.effective.overlaps(&b.effective));
                }
            }
        }

        /// With non-overlapping windows at most one is active on any day
        #[test]
        fn prop_at_most_one_active(
            requests in prop::collection::vec(range_strategy(), 1..20),
            probe in 0i64..450,
        ) {
            let mut accepted: Vec<VersionWindow> = Vec::new();
            for requested in requests {
                if check_no_overlap(&accepted, &requested).is_ok() {
                    let version = next_version(&accepted);
                    accepted.push(VersionWindow { version, effective: requested });
                }
            }
            let on = date("2024-01-01") + Duration::days(probe);
            let active = accepted.iter().filter(|w| w.effective.contains(on)).count();
            prop_assert!(active <= 1);
            prop_assert_eq!(active == 1, active_window(&accepted, on).is_some());
        }
    }
}
