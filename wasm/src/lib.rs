//! WebAssembly module for Batchtrace
//!
//! Provides client-side computation for:
//! - Lot number building and parsing
//! - Formulation range overlap checks
//! - Compatibility checks against do-not-combine rules
//! - FEFO allocation previews

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{allocate, check_compatible, Allocation, Compatibility, IngredientPair};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("batchtrace-wasm ready"));
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

fn parse_date(raw: &str) -> Result<NaiveDate, JsValue> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| js_error("Invalid date", e))
}

/// Build an ingredient lot number from its parts
#[wasm_bindgen]
pub fn build_ingredient_lot_number(ingredient_id: i32, supplier_id: &str, batch_id: &str) -> Result<String, JsValue> {
    IngredientLotNumber::new(ingredient_id, supplier_id, batch_id)
        .map(|lot| lot.to_string())
        .map_err(|e| js_error("Invalid lot number", e))
}

/// Build a product lot number from its parts
#[wasm_bindgen]
pub fn build_product_lot_number(product_id: i32, manufacturer_id: &str, batch_id: &str) -> Result<String, JsValue> {
    ProductLotNumber::new(product_id, manufacturer_id, batch_id)
        .map(|lot| lot.to_string())
        .map_err(|e| js_error("Invalid lot number", e))
}

#[derive(Serialize)]
struct LotParts<'a> {
    id: i32,
    party: &'a str,
    batch_id: &'a str,
}

/// Split an ingredient lot number into `{ id, party, batch_id }` JSON
#[wasm_bindgen]
pub fn parse_ingredient_lot_number(raw: &str) -> Result<String, JsValue> {
    let lot = IngredientLotNumber::parse(raw).map_err(|e| js_error("Invalid lot number", e))?;
    let parts = LotParts {
        id: lot.ingredient_id(),
        party: lot.supplier_id(),
        batch_id: lot.batch_id(),
    };
    serde_json::to_string(&parts).map_err(|e| js_error("Serialization failed", e))
}

/// Split a product lot number into `{ id, party, batch_id }` JSON
#[wasm_bindgen]
pub fn parse_product_lot_number(raw: &str) -> Result<String, JsValue> {
    let lot = ProductLotNumber::parse(raw).map_err(|e| js_error("Invalid lot number", e))?;
    let parts = LotParts {
        id: lot.product_id(),
        party: lot.manufacturer_id(),
        batch_id: lot.batch_id(),
    };
    serde_json::to_string(&parts).map_err(|e| js_error("Serialization failed", e))
}

/// Whether two inclusive effective ranges (ISO dates) share a day
#[wasm_bindgen]
pub fn ranges_overlap(start_a: &str, end_a: &str, start_b: &str, end_b: &str) -> Result<bool, JsValue> {
    let a = DateRange::new(parse_date(start_a)?, parse_date(end_a)?)
        .ok_or_else(|| JsValue::from_str("First range ends before it starts"))?;
    let b = DateRange::new(parse_date(start_b)?, parse_date(end_b)?)
        .ok_or_else(|| JsValue::from_str("Second range ends before it starts"))?;
    Ok(a.overlaps(&b))
}

#[derive(Deserialize)]
struct CompatibilityRequest {
    ingredients: Vec<IngredientId>,
    rules: Vec<(IngredientId, IngredientId)>,
}

/// Check a flattened ingredient set against do-not-combine rules
///
/// Input: `{ "ingredients": [1, 2], "rules": [[1, 2]] }`.
/// Output: a `Compatibility` JSON value.
#[wasm_bindgen]
pub fn check_compatibility(request_json: &str) -> Result<String, JsValue> {
    let request: CompatibilityRequest =
        serde_json::from_str(request_json).map_err(|e| js_error("Invalid request JSON", e))?;
    let ingredients: BTreeSet<IngredientId> = request.ingredients.into_iter().collect();
    let rules: Vec<IngredientPair> = request
        .rules
        .into_iter()
        .filter_map(|(a, b)| IngredientPair::new(a, b))
        .collect();
    let result: Compatibility = check_compatible(&ingredients, &rules);
    serde_json::to_string(&result).map_err(|e| js_error("Serialization failed", e))
}

#[derive(Deserialize)]
struct AllocationPreviewRequest {
    ingredient_id: IngredientId,
    needed: Decimal,
    on: NaiveDate,
    #[serde(default)]
    policy: AllocationPolicy,
    stock: Vec<InventoryLot>,
}

/// Preview which rows an allocation would draw, without committing anything
///
/// Output: an `Allocation` JSON value, or an error naming the shortfall.
#[wasm_bindgen]
pub fn preview_allocation(request_json: &str) -> Result<String, JsValue> {
    let mut request: AllocationPreviewRequest =
        serde_json::from_str(request_json).map_err(|e| js_error("Invalid request JSON", e))?;
    let allocation: Allocation = allocate(
        &mut request.stock,
        request.ingredient_id,
        request.needed,
        &request.policy,
        request.on,
    )
    .map_err(|e| js_error("Allocation failed", e))?;
    serde_json::to_string(&allocation).map_err(|e| js_error("Serialization failed", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_lot_numbers() {
        assert_eq!(build_ingredient_lot_number(7, "S1", "B-01").unwrap(), "7-S1-B-01");
        assert_eq!(build_product_lot_number(3, "M1", "run1").unwrap(), "3-M1-run1");
    }

    #[test]
    fn test_parse_lot_number() {
        let json = parse_ingredient_lot_number("7-S1-B-01").unwrap();
        assert_eq!(json, r#"{"id":7,"party":"S1","batch_id":"B-01"}"#);
    }

    #[test]
    fn test_ranges_overlap() {
        assert!(ranges_overlap("2024-01-01", "2024-01-31", "2024-01-31", "2024-02-28").unwrap());
        assert!(!ranges_overlap("2024-01-01", "2024-01-30", "2024-01-31", "2024-02-28").unwrap());
    }

    #[test]
    fn test_check_compatibility() {
        let json = check_compatibility(r#"{"ingredients":[1,2,3],"rules":[[3,1],[4,5]]}"#).unwrap();
        let result: Compatibility = serde_json::from_str(&json).unwrap();
        assert_eq!(result, Compatibility::Conflict(vec![IngredientPair::new(1, 3).unwrap()]));

        let json = check_compatibility(r#"{"ingredients":[1,2],"rules":[[3,1]]}"#).unwrap();
        assert_eq!(serde_json::from_str::<Compatibility>(&json).unwrap(), Compatibility::Compatible);
    }

    #[test]
    fn test_preview_allocation_fefo() {
        let request = r#"{
            "ingredient_id": 5,
            "needed": "15",
            "on": "2024-01-01",
            "stock": [
                {"inventory_id": "00000000-0000-0000-0000-000000000002", "lot_number": "5-S1-L2",
                 "remaining": "10", "expiration_date": "2024-01-10", "received_date": "2023-12-01"},
                {"inventory_id": "00000000-0000-0000-0000-000000000001", "lot_number": "5-S1-L1",
                 "remaining": "10", "expiration_date": "2024-01-05", "received_date": "2023-12-01"}
            ]
        }"#;
        let allocation: Allocation = serde_json::from_str(&preview_allocation(request).unwrap()).unwrap();
        let lots: Vec<(String, Decimal)> = allocation
            .by_lot()
            .into_iter()
            .map(|(lot, qty)| (lot.to_string(), qty))
            .collect();
        assert_eq!(
            lots,
            vec![
                ("5-S1-L1".to_string(), Decimal::from(10)),
                ("5-S1-L2".to_string(), Decimal::from(5)),
            ]
        );
    }
}
