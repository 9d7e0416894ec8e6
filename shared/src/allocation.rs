//! Lot allocation engine
//!
//! Selects inventory rows for one ingredient demand and debits them. The
//! engine works on an in-memory snapshot of a manufacturer's rows; the caller
//! is responsible for locking those rows and persisting the debits.
//!
//! An allocation either takes the full demanded quantity or changes nothing.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AllocationPolicy, Draw, IngredientLotNumber, InventoryLot, LineageEdge, ProductLotNumber};
use crate::types::IngredientId;

/// Not enough usable stock for one ingredient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub ingredient_id: IngredientId,
    pub needed: Decimal,
    pub available: Decimal,
}

impl std::fmt::Display for Shortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ingredient {} needs {} but only {} is available",
            self.ingredient_id, self.needed, self.available
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("shortfall: {0}")]
    Shortfall(Shortage),

    #[error("lot {0} is not held for this ingredient")]
    LotNotAvailable(IngredientLotNumber),

    #[error("lot {0} has no remaining quantity")]
    LotExhausted(IngredientLotNumber),

    #[error("lot {0} expires before the production date")]
    LotExpired(IngredientLotNumber),

    #[error("demand for ingredient {0} must be positive")]
    NonPositiveDemand(IngredientId),

    #[error("manual selection for ingredient {0} lists no lots")]
    EmptyManualSelection(IngredientId),
}

/// The rows drawn to satisfy one ingredient demand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub ingredient_id: IngredientId,
    pub draws: Vec<Draw>,
}

impl Allocation {
    pub fn total(&self) -> Decimal {
        self.draws.iter().map(|d| d.quantity).sum()
    }

    /// Per-lot quantities in draw order. Draws from several rows of one lot
    /// collapse into a single entry.
    pub fn by_lot(&self) -> Vec<(IngredientLotNumber, Decimal)> {
        let mut merged: Vec<(IngredientLotNumber, Decimal)> = Vec::new();
        for draw in &self.draws {
            match merged.iter_mut().find(|(lot, _)| *lot == draw.lot_number) {
                Some((_, quantity)) => *quantity += draw.quantity,
                None => merged.push((draw.lot_number.clone(), draw.quantity)),
            }
        }
        merged
    }

    pub fn edges(&self, product_lot: &ProductLotNumber) -> Vec<LineageEdge> {
        self.by_lot()
            .into_iter()
            .map(|(ingredient_lot_number, quantity_used)| LineageEdge {
                product_lot_number: product_lot.clone(),
                ingredient_lot_number,
                quantity_used,
            })
            .collect()
    }
}

fn fefo_sort(stock: &[InventoryLot], indices: &mut [usize]) {
    indices.sort_by(|&a, &b| {
        let (a, b) = (&stock[a], &stock[b]);
        a.expiration_date
            .cmp(&b.expiration_date)
            .then(a.received_date.cmp(&b.received_date))
            .then(a.inventory_id.cmp(&b.inventory_id))
    });
}

/// Allocatable rows of an ingredient, earliest expiration first
pub fn fefo_candidates(stock: &[InventoryLot], ingredient_id: IngredientId, on: NaiveDate) -> Vec<usize> {
    let mut indices: Vec<usize> = stock
        .iter()
        .enumerate()
        .filter(|(_, row)| row.lot_number.ingredient_id() == ingredient_id && row.is_allocatable(on))
        .map(|(i, _)| i)
        .collect();
    fefo_sort(stock, &mut indices);
    indices
}

fn manual_candidates(
    stock: &[InventoryLot],
    ingredient_id: IngredientId,
    lots: &[IngredientLotNumber],
    on: NaiveDate,
) -> Result<Vec<usize>, AllocationError> {
    if lots.is_empty() {
        return Err(AllocationError::EmptyManualSelection(ingredient_id));
    }

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for lot in lots {
        if !seen.insert(lot) {
            continue;
        }
        if lot.ingredient_id() != ingredient_id {
            return Err(AllocationError::LotNotAvailable(lot.clone()));
        }

        let rows: Vec<usize> = stock
            .iter()
            .enumerate()
            .filter(|(_, row)| row.lot_number == *lot)
            .map(|(i, _)| i)
            .collect();
        if rows.is_empty() {
            return Err(AllocationError::LotNotAvailable(lot.clone()));
        }
        if rows.iter().all(|&i| stock[i].expiration_date < on) {
            return Err(AllocationError::LotExpired(lot.clone()));
        }

        let mut usable: Vec<usize> = rows.into_iter().filter(|&i| stock[i].is_allocatable(on)).collect();
        if usable.is_empty() {
            return Err(AllocationError::LotExhausted(lot.clone()));
        }
        fefo_sort(stock, &mut usable);
        ordered.extend(usable);
    }
    Ok(ordered)
}

/// Total usable quantity of an ingredient on a date
pub fn available_quantity(stock: &[InventoryLot], ingredient_id: IngredientId, on: NaiveDate) -> Decimal {
    fefo_candidates(stock, ingredient_id, on)
        .into_iter()
        .map(|i| stock[i].remaining)
        .sum()
}

/// Take `needed` of an ingredient from `stock` under `policy`
///
/// On success the drawn rows are debited in place. On any error `stock` is
/// left untouched.
pub fn allocate(
    stock: &mut [InventoryLot],
    ingredient_id: IngredientId,
    needed: Decimal,
    policy: &AllocationPolicy,
    on: NaiveDate,
) -> Result<Allocation, AllocationError> {
    if needed <= Decimal::ZERO {
        return Err(AllocationError::NonPositiveDemand(ingredient_id));
    }

    let order = match policy {
        AllocationPolicy::Fefo => fefo_candidates(stock, ingredient_id, on),
        AllocationPolicy::Manual { lots } => manual_candidates(stock, ingredient_id, lots, on)?,
    };

    let available: Decimal = order.iter().map(|&i| stock[i].remaining).sum();
    if available < needed {
        return Err(AllocationError::Shortfall(Shortage {
            ingredient_id,
            needed,
            available,
        }));
    }

    let mut still_needed = needed;
    let mut draws = Vec::new();
    for i in order {
        if still_needed <= Decimal::ZERO {
            break;
        }
        let row = &mut stock[i];
        let take = row.remaining.min(still_needed);
        row.remaining -= take;
        still_needed -= take;
        draws.push(Draw {
            inventory_id: row.inventory_id,
            lot_number: row.lot_number.clone(),
            quantity: take,
        });
    }

    Ok(Allocation { ingredient_id, draws })
}
