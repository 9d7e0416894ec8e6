//! Compatibility and ingredient flattening tests
//!
//! Tests for do-not-combine checks including:
//! - Compound ingredients expand to their active formulations' atomics
//! - Pair rules are symmetric
//! - Product comparison checks the union of both ingredient sets
//! - Listing order and component quantities

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    check_compatible, compare_products, flatten_for_listing, flattened_ingredient_set, Compatibility, DateRange,
    Formulation, FormulationBook, FormulationLine, IngredientId, IngredientPair, RecipeLine,
};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn set(ids: &[IngredientId]) -> BTreeSet<IngredientId> {
    ids.iter().copied().collect()
}

fn pair(a: IngredientId, b: IngredientId) -> IngredientPair {
    IngredientPair::new(a, b).unwrap()
}

fn formulation(
    compound_id: IngredientId,
    supplier_id: &str,
    start: &str,
    end: &str,
    pack_size: &str,
    lines: &[(IngredientId, &str)],
) -> Formulation {
    Formulation {
        id: Uuid::new_v4(),
        compound_id,
        supplier_id: supplier_id.to_string(),
        version: 1,
        effective: DateRange::new(date(start), date(end)).unwrap(),
        unit_price: dec("1"),
        pack_size: dec(pack_size),
        lines: lines
            .iter()
            .map(|(id, qty)| FormulationLine {
                atomic_ingredient_id: *id,
                quantity: dec(qty),
            })
            .collect(),
    }
}

fn recipe_line(ingredient_id: IngredientId, quantity: &str) -> RecipeLine {
    RecipeLine {
        ingredient_id,
        quantity: dec(quantity),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A compound whose active formulation holds a forbidden atomic conflicts
    #[test]
    fn test_conflict_through_compound() {
        let book = FormulationBook::new(vec![formulation(
            50,
            "S1",
            "2024-01-01",
            "2024-12-31",
            "1",
            &[(7, "1"), (8, "1")],
        )]);
        let lines = vec![recipe_line(50, "2"), recipe_line(3, "1")];
        let rules = vec![pair(3, 8)];

        let flattened = flattened_ingredient_set(&lines, &book, date("2024-06-01"));
        assert_eq!(flattened, set(&[3, 7, 8, 50]));
        assert_eq!(
            check_compatible(&flattened, &rules),
            Compatibility::Conflict(vec![pair(3, 8)])
        );
    }

    /// Only formulations active on the date contribute atomics
    #[test]
    fn test_inactive_formulation_ignored() {
        let book = FormulationBook::new(vec![formulation(
            50,
            "S1",
            "2024-01-01",
            "2024-01-31",
            "1",
            &[(8, "1")],
        )]);
        let lines = vec![recipe_line(50, "2"), recipe_line(3, "1")];

        let flattened = flattened_ingredient_set(&lines, &book, date("2024-06-01"));
        assert_eq!(flattened, set(&[3, 50]));
        assert!(check_compatible(&flattened, &[pair(3, 8)]).is_compatible());
    }

    /// Every supplier's active formulation of a compound is considered
    #[test]
    fn test_all_suppliers_flattened() {
        let book = FormulationBook::new(vec![
            formulation(50, "S1", "2024-01-01", "2024-12-31", "1", &[(7, "1")]),
            formulation(50, "S2", "2024-03-01", "2024-12-31", "1", &[(9, "1")]),
        ]);
        let flattened = flattened_ingredient_set(&[recipe_line(50, "1")], &book, date("2024-06-01"));
        assert_eq!(flattened, set(&[7, 9, 50]));
    }

    /// Two individually safe products can conflict when combined
    #[test]
    fn test_compare_products_uses_union() {
        let rules = vec![pair(1, 4)];
        assert!(check_compatible(&set(&[1, 2]), &rules).is_compatible());
        assert!(check_compatible(&set(&[3, 4]), &rules).is_compatible());
        assert_eq!(
            compare_products(&set(&[1, 2]), &set(&[3, 4]), &rules),
            Compatibility::Conflict(vec![pair(1, 4)])
        );
    }

    #[test]
    fn test_compatibility_wire_format() {
        let json = serde_json::to_value(Compatibility::Conflict(vec![pair(2, 1)])).unwrap();
        assert_eq!(json["status"], "conflict");
        assert_eq!(json["pairs"].as_array().unwrap().len(), 1);
        let json = serde_json::to_value(Compatibility::Compatible).unwrap();
        assert_eq!(json["status"], "compatible");
    }

    /// Listing orders lines and components by descending quantity
    #[test]
    fn test_listing_expands_compounds() {
        let book = FormulationBook::new(vec![formulation(
            50,
            "S1",
            "2024-01-01",
            "2024-12-31",
            "2",
            &[(7, "0.5"), (8, "1.5")],
        )]);
        let lines = vec![recipe_line(3, "1"), recipe_line(50, "4"), recipe_line(2, "1")];

        let listed = flatten_for_listing(&lines, &book, date("2024-06-01"));

        let order: Vec<IngredientId> = listed.iter().map(|l| l.ingredient_id).collect();
        assert_eq!(order, vec![50, 2, 3]);
        let components: Vec<(IngredientId, Decimal)> =
            listed[0].components.iter().map(|c| (c.ingredient_id, c.quantity)).collect();
        assert_eq!(components, vec![(8, dec("3")), (7, dec("1"))]);
        assert!(listed[1].components.is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn ids_strategy() -> impl Strategy<Value = BTreeSet<IngredientId>> {
        prop::collection::btree_set(1i32..30, 0..10)
    }

    fn rules_strategy() -> impl Strategy<Value = Vec<IngredientPair>> {
        prop::collection::vec((1i32..30, 1i32..30), 0..15)
            .prop_map(|raw| raw.into_iter().filter_map(|(a, b)| IngredientPair::new(a, b)).collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// A pair rule reads the same in either order
        #[test]
        fn prop_pair_symmetric(a in 1i32..1000, b in 1i32..1000) {
            prop_assert_eq!(IngredientPair::new(a, b), IngredientPair::new(b, a));
        }

        /// Swapping the two products never changes the comparison
        #[test]
        fn prop_compare_symmetric(
            first in ids_strategy(),
            second in ids_strategy(),
            rules in rules_strategy(),
        ) {
            prop_assert_eq!(
                compare_products(&first, &second, &rules),
                compare_products(&second, &first, &rules)
            );
        }

        /// Every reported pair is a rule with both members present
        #[test]
        fn prop_conflicts_are_present_rules(
            ids in ids_strategy(),
            rules in rules_strategy(),
        ) {
            match check_compatible(&ids, &rules) {
                Compatibility::Compatible => {
                    for rule in &rules {
                        prop_assert!(!(ids.contains(&rule.first()) && ids.contains(&rule.second())));
                    }
                }
                Compatibility::Conflict(pairs) => {
                    prop_assert!(!pairs.is_empty());
                    for p in &pairs {
                        prop_assert!(rules.contains(p));
                        prop_assert!(ids.contains(&p.first()) && ids.contains(&p.second()));
                    }
                }
            }
        }
    }
}
