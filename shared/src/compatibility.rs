//! Do-not-combine rules and the compatibility check

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::IngredientId;

/// Unordered pair of ingredients, stored with the smaller id first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IngredientPair {
    first: IngredientId,
    second: IngredientId,
}

impl IngredientPair {
    /// `None` when both ids are the same ingredient
    pub fn new(a: IngredientId, b: IngredientId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { first: a, second: b }),
            std::cmp::Ordering::Greater => Some(Self { first: b, second: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn first(&self) -> IngredientId {
        self.first
    }

    pub fn second(&self) -> IngredientId {
        self.second
    }

    fn within(&self, ingredients: &BTreeSet<IngredientId>) -> bool {
        ingredients.contains(&self.first) && ingredients.contains(&self.second)
    }
}

impl std::fmt::Display for IngredientPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "pairs", rename_all = "snake_case")]
pub enum Compatibility {
    Compatible,
    /// Offending pairs, sorted
    Conflict(Vec<IngredientPair>),
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Compatibility::Compatible)
    }
}

/// Every rule whose two ingredients both occur in `ingredients`
pub fn check_compatible(ingredients: &BTreeSet<IngredientId>, rules: &[IngredientPair]) -> Compatibility {
    let conflicts: BTreeSet<IngredientPair> = rules.iter().filter(|rule| rule.within(ingredients)).copied().collect();
    if conflicts.is_empty() {
        Compatibility::Compatible
    } else {
        Compatibility::Conflict(conflicts.into_iter().collect())
    }
}

/// Check whether two products could safely share a line
pub fn compare_products(
    first: &BTreeSet<IngredientId>,
    second: &BTreeSet<IngredientId>,
    rules: &[IngredientPair],
) -> Compatibility {
    let union: BTreeSet<IngredientId> = first.union(second).copied().collect();
    check_compatible(&union, rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[IngredientId]) -> BTreeSet<IngredientId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_pair_is_normalized() {
        assert_eq!(IngredientPair::new(9, 3), IngredientPair::new(3, 9));
        assert_eq!(IngredientPair::new(9, 3).unwrap().first(), 3);
        assert!(IngredientPair::new(4, 4).is_none());
    }

    #[test]
    fn test_conflict_detected() {
        let rules = vec![IngredientPair::new(1, 2).unwrap(), IngredientPair::new(3, 4).unwrap()];
        assert_eq!(
            check_compatible(&set(&[1, 2, 5]), &rules),
            Compatibility::Conflict(vec![IngredientPair::new(1, 2).unwrap()])
        );
        assert!(check_compatible(&set(&[1, 3, 5]), &rules).is_compatible());
    }

    #[test]
    fn test_compare_products_uses_union() {
        let rules = vec![IngredientPair::new(1, 7).unwrap()];
        assert!(!compare_products(&set(&[1, 2]), &set(&[7, 8]), &rules).is_compatible());
        assert!(compare_products(&set(&[1, 2]), &set(&[3]), &rules).is_compatible());
    }
}
