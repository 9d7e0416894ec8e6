//! Recipe ledger: versioned compositions of a product

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{IngredientId, ProductId};
use crate::validation::{max_quantity, QUANTITY_SCALE};

/// Quantity of one ingredient (atomic or compound) per standard batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
}

/// An immutable recipe version. The latest by creation date is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub product_id: ProductId,
    pub manufacturer_id: String,
    pub creation_date: NaiveDate,
    pub lines: Vec<RecipeLine>,
}

/// Scaled demand for one top-level ingredient of a production run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemandLine {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaleError {
    #[error("Scaled quantity of ingredient {0} exceeds the storable range")]
    LineOverflow(IngredientId),
    #[error("Scaled quantity of ingredient {0} rounds to zero")]
    LineVanishes(IngredientId),
    #[error("Produced quantity exceeds the storable range")]
    OutputOverflow,
    #[error("Produced quantity rounds to zero")]
    OutputVanishes,
}

/// Round to the stored scale; `None` when out of range
fn to_stored_scale(value: Decimal) -> Option<Decimal> {
    let rounded = value.round_dp_with_strategy(QUANTITY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    (rounded <= max_quantity()).then_some(rounded)
}

/// Scale every recipe line by the batch multiplier
///
/// Demand is rounded to 4 decimal places so debits and lineage edges store
/// exactly what the allocator drew.
pub fn scale_recipe(lines: &[RecipeLine], multiplier: Decimal) -> Result<Vec<DemandLine>, ScaleError> {
    lines
        .iter()
        .map(|line| {
            let quantity = line
                .quantity
                .checked_mul(multiplier)
                .and_then(to_stored_scale)
                .ok_or(ScaleError::LineOverflow(line.ingredient_id))?;
            if quantity.is_zero() {
                return Err(ScaleError::LineVanishes(line.ingredient_id));
            }
            Ok(DemandLine {
                ingredient_id: line.ingredient_id,
                quantity,
            })
        })
        .collect()
}

/// Units produced: `multiplier * standard_batch_size`, at the stored scale
pub fn produced_quantity(standard_batch_size: Decimal, multiplier: Decimal) -> Result<Decimal, ScaleError> {
    let quantity = standard_batch_size
        .checked_mul(multiplier)
        .and_then(to_stored_scale)
        .ok_or(ScaleError::OutputOverflow)?;
    if quantity.is_zero() {
        return Err(ScaleError::OutputVanishes);
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_scale_recipe() {
        let lines = vec![
            RecipeLine { ingredient_id: 1, quantity: dec("15") },
            RecipeLine { ingredient_id: 2, quantity: dec("0.5") },
        ];
        let demand = scale_recipe(&lines, dec("2.5")).unwrap();
        assert_eq!(demand[0].quantity, dec("37.5"));
        assert_eq!(demand[1].quantity, dec("1.25"));
    }

    #[test]
    fn test_scaled_demand_rounds_to_stored_scale() {
        let lines = vec![RecipeLine { ingredient_id: 1, quantity: dec("15") }];
        let demand = scale_recipe(&lines, dec("0.3333")).unwrap();
        assert_eq!(demand[0].quantity, dec("4.9995"));

        let lines = vec![RecipeLine { ingredient_id: 1, quantity: dec("0.0003") }];
        let demand = scale_recipe(&lines, dec("0.5")).unwrap();
        assert_eq!(demand[0].quantity, dec("0.0002"));
        assert_eq!(demand[0].quantity.round_dp(QUANTITY_SCALE), demand[0].quantity);
    }

    #[test]
    fn test_scale_recipe_rejects_vanishing_line() {
        let lines = vec![RecipeLine { ingredient_id: 7, quantity: dec("0.0001") }];
        assert_eq!(scale_recipe(&lines, dec("0.1")), Err(ScaleError::LineVanishes(7)));
    }

    #[test]
    fn test_scale_recipe_overflow_is_an_error() {
        let lines = vec![RecipeLine { ingredient_id: 3, quantity: dec("9999") }];
        let huge = dec("10000000000000000000000000");
        assert_eq!(scale_recipe(&lines, huge), Err(ScaleError::LineOverflow(3)));
        assert_eq!(scale_recipe(&lines, Decimal::MAX), Err(ScaleError::LineOverflow(3)));
        assert_eq!(produced_quantity(dec("100"), Decimal::MAX), Err(ScaleError::OutputOverflow));
    }

    #[test]
    fn test_produced_quantity() {
        assert_eq!(produced_quantity(dec("100"), dec("3")), Ok(dec("300")));
        assert_eq!(produced_quantity(dec("0.0001"), dec("0.1")), Err(ScaleError::OutputVanishes));
    }
}
