//! Production run planning
//!
//! Allocates every top-level recipe line of a batch against one snapshot.
//! Either every line is satisfied or the snapshot is left as it was.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::allocation::{allocate, Allocation, AllocationError, Shortage};
use crate::models::{AllocationPolicy, DemandLine, InventoryLot, LineageEdge, ProductLotNumber};
use crate::types::IngredientId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductionError {
    /// Every ingredient that could not be covered, in demand order
    #[error("insufficient stock for {} ingredient(s)", .0.len())]
    Shortfall(Vec<Shortage>),

    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// Successful allocation of a whole batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub allocations: Vec<Allocation>,
}

impl ProductionPlan {
    /// One lineage edge per ingredient lot consumed
    pub fn edges(&self, product_lot: &ProductLotNumber) -> Vec<LineageEdge> {
        self.allocations
            .iter()
            .flat_map(|allocation| allocation.edges(product_lot))
            .collect()
    }

    /// Total debit per inventory row, in first-drawn order
    pub fn debits(&self) -> Vec<(Uuid, Decimal)> {
        let mut debits: Vec<(Uuid, Decimal)> = Vec::new();
        for draw in self.allocations.iter().flat_map(|a| a.draws.iter()) {
            match debits.iter_mut().find(|(id, _)| *id == draw.inventory_id) {
                Some((_, quantity)) => *quantity += draw.quantity,
                None => debits.push((draw.inventory_id, draw.quantity)),
            }
        }
        debits
    }

    pub fn consumed(&self, ingredient_id: IngredientId) -> Decimal {
        self.allocations
            .iter()
            .filter(|a| a.ingredient_id == ingredient_id)
            .map(Allocation::total)
            .sum()
    }
}

/// Allocate every demand line of a batch
///
/// Lines without an entry in `policies` use FEFO. Shortfalls are collected
/// across all lines before failing; any other allocation error fails at once.
pub fn plan_production(
    stock: &mut [InventoryLot],
    demand: &[DemandLine],
    policies: &HashMap<IngredientId, AllocationPolicy>,
    on: NaiveDate,
) -> Result<ProductionPlan, ProductionError> {
    let mut working = stock.to_vec();
    let mut allocations = Vec::with_capacity(demand.len());
    let mut shortages = Vec::new();
    let fefo = AllocationPolicy::Fefo;

    for line in demand {
        let policy = policies.get(&line.ingredient_id).unwrap_or(&fefo);
        match allocate(&mut working, line.ingredient_id, line.quantity, policy, on) {
            Ok(allocation) => allocations.push(allocation),
            Err(AllocationError::Shortfall(shortage)) => shortages.push(shortage),
            Err(e) => return Err(e.into()),
        }
    }

    if !shortages.is_empty() {
        return Err(ProductionError::Shortfall(shortages));
    }

    stock.clone_from_slice(&working);
    Ok(ProductionPlan { allocations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientLotNumber;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(ingredient: IngredientId, batch: &str, remaining: i64) -> InventoryLot {
        InventoryLot {
            inventory_id: Uuid::new_v4(),
            lot_number: IngredientLotNumber::new(ingredient, "S1", batch).unwrap(),
            remaining: Decimal::from(remaining),
            expiration_date: d(2024, 6, 1),
            received_date: d(2024, 1, 1),
        }
    }

    fn line(ingredient_id: IngredientId, quantity: i64) -> DemandLine {
        DemandLine {
            ingredient_id,
            quantity: Decimal::from(quantity),
        }
    }

    #[test]
    fn test_all_shortages_reported_and_nothing_debited() {
        let mut stock = vec![row(1, "A", 10), row(2, "B", 1), row(3, "C", 1)];
        let before = stock.clone();
        let err = plan_production(
            &mut stock,
            &[line(1, 5), line(2, 4), line(3, 2)],
            &HashMap::new(),
            d(2024, 1, 10),
        )
        .unwrap_err();

        match err {
            ProductionError::Shortfall(shortages) => {
                let ids: Vec<_> = shortages.iter().map(|s| s.ingredient_id).collect();
                assert_eq!(ids, vec![2, 3]);
            }
            other => panic!("expected shortfall, got {:?}", other),
        }
        assert_eq!(stock, before);
    }

    #[test]
    fn test_plan_commits_debits_on_success() {
        let mut stock = vec![row(1, "A", 10), row(2, "B", 4)];
        let plan = plan_production(&mut stock, &[line(1, 5), line(2, 4)], &HashMap::new(), d(2024, 1, 10)).unwrap();
        assert_eq!(plan.consumed(1), Decimal::from(5));
        assert_eq!(plan.debits().len(), 2);
        assert_eq!(stock[0].remaining, Decimal::from(5));
        assert_eq!(stock[1].remaining, Decimal::ZERO);
    }

    #[test]
    fn test_manual_error_aborts_batch() {
        let mut stock = vec![row(1, "A", 10)];
        let mut policies = HashMap::new();
        policies.insert(1, AllocationPolicy::Manual { lots: vec![] });
        let err = plan_production(&mut stock, &[line(1, 5)], &policies, d(2024, 1, 10)).unwrap_err();
        assert_eq!(err, ProductionError::Allocation(AllocationError::EmptyManualSelection(1)));
        assert_eq!(stock[0].remaining, Decimal::from(10));
    }
}
