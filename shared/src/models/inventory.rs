//! Inventory ledger models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::IngredientLotNumber;

/// One receipt of an ingredient lot held by a manufacturer
///
/// `remaining` only ever decreases and never goes below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLot {
    pub inventory_id: Uuid,
    pub lot_number: IngredientLotNumber,
    pub remaining: Decimal,
    /// Copied from the ingredient batch at receipt
    pub expiration_date: NaiveDate,
    pub received_date: NaiveDate,
}

impl InventoryLot {
    /// Usable for a production run on `on`
    pub fn is_allocatable(&self, on: NaiveDate) -> bool {
        self.remaining > Decimal::ZERO && self.expiration_date >= on
    }
}

/// How lots are chosen for one ingredient line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// First expired, first out
    #[default]
    Fefo,
    /// Caller-chosen lots, consumed in the listed order
    Manual { lots: Vec<IngredientLotNumber> },
}

/// Quantity taken from one inventory row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub inventory_id: Uuid,
    pub lot_number: IngredientLotNumber,
    pub quantity: Decimal,
}

/// On-hand quantity of one lot for a manufacturer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnHand {
    pub lot_number: IngredientLotNumber,
    pub ingredient_name: String,
    pub remaining: Decimal,
    pub expiration_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn lot(remaining: i64, expires: NaiveDate) -> InventoryLot {
        InventoryLot {
            inventory_id: Uuid::new_v4(),
            lot_number: IngredientLotNumber::new(1, "S1", "B1").unwrap(),
            remaining: Decimal::from(remaining),
            expiration_date: expires,
            received_date: d(2024, 1, 1),
        }
    }

    #[test]
    fn test_expiring_on_production_day_is_allocatable() {
        assert!(lot(5, d(2024, 3, 1)).is_allocatable(d(2024, 3, 1)));
        assert!(!lot(5, d(2024, 3, 1)).is_allocatable(d(2024, 3, 2)));
    }

    #[test]
    fn test_empty_row_not_allocatable() {
        assert!(!lot(0, d(2025, 1, 1)).is_allocatable(d(2024, 3, 1)));
    }

    #[test]
    fn test_policy_serde_shape() {
        let json = serde_json::to_string(&AllocationPolicy::Fefo).unwrap();
        assert_eq!(json, r#"{"policy":"fefo"}"#);
        let manual: AllocationPolicy =
            serde_json::from_str(r#"{"policy":"manual","lots":["1-S1-B1"]}"#).unwrap();
        assert!(matches!(manual, AllocationPolicy::Manual { ref lots } if lots.len() == 1));
    }
}
