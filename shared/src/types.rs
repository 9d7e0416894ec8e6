//! Common types used across the platform

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of an ingredient (atomic or compound)
pub type IngredientId = i32;

/// Identifier of a finished product
pub type ProductId = i32;

/// Identifier of a product category
pub type CategoryId = i32;

/// Closed date interval `[start, end]`, both ends inclusive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Two closed intervals overlap iff `start1 <= end2 && start2 <= end1`
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn range(a: NaiveDate, b: NaiveDate) -> DateRange {
        DateRange::new(a, b).unwrap()
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(DateRange::new(d(2024, 2, 1), d(2024, 1, 1)).is_none());
        assert!(DateRange::new(d(2024, 1, 1), d(2024, 1, 1)).is_some());
    }

    #[test]
    fn test_overlap_shared_endpoint() {
        let a = range(d(2024, 1, 1), d(2024, 3, 31));
        let b = range(d(2024, 3, 31), d(2024, 6, 30));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn test_adjacent_ranges_do_not_overlap() {
        let a = range(d(2024, 1, 1), d(2024, 3, 31));
        let b = range(d(2024, 4, 1), d(2024, 6, 30));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn test_nested_range_overlaps() {
        let outer = range(d(2024, 1, 1), d(2024, 12, 31));
        let inner = range(d(2024, 5, 1), d(2024, 5, 2));
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let r = range(d(2024, 1, 1), d(2024, 1, 31));
        assert!(r.contains(d(2024, 1, 1)));
        assert!(r.contains(d(2024, 1, 31)));
        assert!(!r.contains(d(2024, 2, 1)));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn day(offset: i64) -> NaiveDate {
            d(2024, 1, 1) + chrono::Duration::days(offset)
        }

        proptest! {
            #[test]
            fn overlap_is_symmetric(a in 0i64..400, la in 0i64..60, b in 0i64..400, lb in 0i64..60) {
                let x = range(day(a), day(a + la));
                let y = range(day(b), day(b + lb));
                prop_assert_eq!(x.overlaps(&y), y.overlaps(&x));
            }

            #[test]
            fn overlap_iff_common_day(a in 0i64..100, la in 0i64..20, b in 0i64..100, lb in 0i64..20) {
                let x = range(day(a), day(a + la));
                let y = range(day(b), day(b + lb));
                let common = (0..=la).any(|i| y.contains(day(a + i)));
                prop_assert_eq!(x.overlaps(&y), common);
            }
        }
    }
}
