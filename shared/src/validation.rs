//! Validation utilities for Batchtrace
//!
//! Authoring-time checks. Anything rejected here never reaches the allocator,
//! which is why the allocator itself does not re-check line quantities.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::types::IngredientId;

// ============================================================================
// Identifier Validations
// ============================================================================

/// Validate a supplier or manufacturer code (1-32 chars, alphanumeric or '_')
///
/// Hyphens are reserved as the lot number separator.
pub fn validate_party_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Party code cannot be empty");
    }
    if code.len() > 32 {
        return Err("Party code must be at most 32 characters");
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Party code must be alphanumeric or underscore only");
    }
    Ok(())
}

/// Validate an operator-chosen batch identifier (1-64 chars, no whitespace)
pub fn validate_batch_identifier(batch_id: &str) -> Result<(), &'static str> {
    if batch_id.is_empty() {
        return Err("Batch identifier cannot be empty");
    }
    if batch_id.len() > 64 {
        return Err("Batch identifier must be at most 64 characters");
    }
    if batch_id.chars().any(char::is_whitespace) {
        return Err("Batch identifier cannot contain whitespace");
    }
    Ok(())
}

/// Validate an ingredient, product or category display name
pub fn validate_display_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty");
    }
    if trimmed.len() > 120 {
        return Err("Name must be at most 120 characters");
    }
    Ok(())
}

// ============================================================================
// Quantity Validations
// ============================================================================

/// Decimal places stored for every quantity and amount
pub const QUANTITY_SCALE: u32 = 4;

/// Largest storable quantity, `NUMERIC(14, 4)`
pub fn max_quantity() -> Decimal {
    Decimal::new(99_999_999_999_999, QUANTITY_SCALE)
}

/// Value fits the stored column exactly: at most 4 decimal places and within range
pub fn validate_storable(value: Decimal) -> Result<(), &'static str> {
    if value.round_dp(QUANTITY_SCALE) != value {
        return Err("At most 4 decimal places are allowed");
    }
    if value.abs() > max_quantity() {
        return Err("Value exceeds 9999999999.9999");
    }
    Ok(())
}

pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    validate_storable(quantity)
}

pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    validate_storable(amount)
}

/// Receipts of one ingredient lot, across all manufacturers, stay within the lot
pub fn validate_receipt_capacity(
    batch_quantity: Decimal,
    already_received: Decimal,
    incoming: Decimal,
) -> Result<(), &'static str> {
    match already_received.checked_add(incoming) {
        Some(total) if total <= batch_quantity => Ok(()),
        _ => Err("Receipt exceeds the quantity left in the lot"),
    }
}

/// Validate the lines of a recipe or formulation
///
/// Lines must be non-empty, every quantity strictly positive, and each
/// ingredient may appear only once.
pub fn validate_composition(lines: &[(IngredientId, Decimal)]) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("At least one ingredient line is required");
    }
    let mut seen = HashSet::with_capacity(lines.len());
    for (ingredient_id, quantity) in lines {
        if *quantity <= Decimal::ZERO {
            return Err("Ingredient quantities must be positive");
        }
        validate_storable(*quantity)?;
        if !seen.insert(*ingredient_id) {
            return Err("Each ingredient may appear only once");
        }
    }
    Ok(())
}

// ============================================================================
// Date Validations
// ============================================================================

/// Expiration must lie at least `min_days` after `today`
pub fn validate_expiration_horizon(
    expiration: NaiveDate,
    today: NaiveDate,
    min_days: i64,
) -> Result<(), &'static str> {
    if expiration < today + Duration::days(min_days) {
        return Err("Expiration date is not far enough in the future");
    }
    Ok(())
}

/// A product batch must expire after it is produced
pub fn validate_production_dates(
    production_date: NaiveDate,
    expiration_date: NaiveDate,
) -> Result<(), &'static str> {
    if expiration_date <= production_date {
        return Err("Expiration date must be after the production date");
    }
    Ok(())
}

/// Production runs on today or later; lots are never drawn against a past date
pub fn validate_production_start(production_date: NaiveDate, today: NaiveDate) -> Result<(), &'static str> {
    if production_date < today {
        return Err("Production date cannot be in the past");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_validate_party_code_valid() {
        assert!(validate_party_code("MFG001").is_ok());
        assert!(validate_party_code("21").is_ok());
        assert!(validate_party_code("acme_foods").is_ok());
    }

    #[test]
    fn test_validate_party_code_invalid() {
        assert!(validate_party_code("").is_err());
        assert!(validate_party_code("MFG-001").is_err());
        assert!(validate_party_code("MFG 001").is_err());
        assert!(validate_party_code(&"X".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_batch_identifier() {
        assert!(validate_batch_identifier("B0901").is_ok());
        assert!(validate_batch_identifier("2024-01-A").is_ok());
        assert!(validate_batch_identifier("").is_err());
        assert!(validate_batch_identifier("B 1").is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Sea Salt").is_ok());
        assert!(validate_display_name("   ").is_err());
    }

    #[test]
    fn test_validate_positive_quantity() {
        assert!(validate_positive_quantity(dec("0.01")).is_ok());
        assert!(validate_positive_quantity(Decimal::ZERO).is_err());
        assert!(validate_positive_quantity(dec("-1")).is_err());
    }

    #[test]
    fn test_quantities_fit_stored_scale() {
        assert!(validate_positive_quantity(dec("0.0001")).is_ok());
        assert!(validate_positive_quantity(dec("1.50000")).is_ok());
        assert!(validate_positive_quantity(dec("0.33333")).is_err());
        assert!(validate_positive_quantity(dec("0.00004")).is_err());
        assert!(validate_positive_quantity(dec("9999999999.9999")).is_ok());
        assert!(validate_positive_quantity(dec("10000000000")).is_err());
        assert!(validate_positive_quantity(dec("10000000000000000000000000")).is_err());
        assert!(validate_non_negative_amount(dec("1.23456")).is_err());
        assert!(validate_composition(&[(1, dec("2.12345"))]).is_err());
    }

    #[test]
    fn test_receipt_capacity_boundary() {
        assert!(validate_receipt_capacity(dec("100"), dec("60"), dec("40")).is_ok());
        assert!(validate_receipt_capacity(dec("100"), dec("60"), dec("40.0001")).is_err());
        assert!(validate_receipt_capacity(dec("100"), Decimal::ZERO, dec("100")).is_ok());
        assert!(validate_receipt_capacity(dec("100"), dec("100"), dec("0.0001")).is_err());
        assert!(validate_receipt_capacity(dec("100"), Decimal::MAX, dec("1")).is_err());
    }

    #[test]
    fn test_production_start_not_in_past() {
        let today = d(2026, 10, 18);
        assert!(validate_production_start(today, today).is_ok());
        assert!(validate_production_start(d(2026, 11, 1), today).is_ok());
        assert!(validate_production_start(d(2020, 12, 1), today).is_err());
    }

    #[test]
    fn test_validate_composition() {
        assert!(validate_composition(&[(1, dec("2.5")), (2, dec("1"))]).is_ok());
        assert!(validate_composition(&[]).is_err());
        assert!(validate_composition(&[(1, Decimal::ZERO)]).is_err());
        assert!(validate_composition(&[(1, dec("1")), (1, dec("2"))]).is_err());
    }

    #[test]
    fn test_expiration_horizon_boundary() {
        let today = d(2024, 1, 1);
        assert!(validate_expiration_horizon(d(2024, 3, 31), today, 90).is_ok());
        assert!(validate_expiration_horizon(d(2024, 3, 30), today, 90).is_err());
    }

    #[test]
    fn test_production_dates() {
        assert!(validate_production_dates(d(2024, 1, 1), d(2024, 6, 1)).is_ok());
        assert!(validate_production_dates(d(2024, 1, 1), d(2024, 1, 1)).is_err());
    }
}
