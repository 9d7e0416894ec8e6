//! Catalog reference data: ingredients, products, categories and parties

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CategoryId, IngredientId, ProductId};

/// Whether an ingredient is a raw material or composed from others
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IngredientKind {
    Atomic,
    /// Composed of atomic ingredients through a supplier formulation
    Compound,
}

impl IngredientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngredientKind::Atomic => "atomic",
            IngredientKind::Compound => "compound",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "atomic" => Some(IngredientKind::Atomic),
            "compound" => Some(IngredientKind::Compound),
            _ => None,
        }
    }
}

impl std::fmt::Display for IngredientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngredientKind::Atomic => write!(f, "Atomic"),
            IngredientKind::Compound => write!(f, "Compound"),
        }
    }
}

/// Shared ingredient reference. Kind never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub kind: IngredientKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A finished product owned by one manufacturer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
    pub manufacturer_id: String,
    /// Units produced by one recipe run at multiplier 1
    pub standard_batch_size: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_strings() {
        assert_eq!(IngredientKind::from_str("atomic"), Some(IngredientKind::Atomic));
        assert_eq!(IngredientKind::from_str("Compound"), Some(IngredientKind::Compound));
        assert_eq!(IngredientKind::from_str("mixture"), None);
        assert_eq!(IngredientKind::Compound.as_str(), "compound");
    }
}
