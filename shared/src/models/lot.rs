//! Lot numbers and lot records
//!
//! Lot numbers are business identifiers built deterministically from other
//! ids, not surrogate keys:
//!
//! - ingredient lot: `{ingredientId}-{supplierId}-{batchId}`
//! - product lot: `{productId}-{manufacturerId}-{batchId}`
//!
//! Party codes (supplier/manufacturer) never contain a hyphen, so a lot number
//! always splits into exactly three parts at the first two hyphens; the batch
//! identifier keeps any hyphens of its own.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{IngredientId, ProductId};
use crate::validation::{validate_batch_identifier, validate_party_code};

/// Errors raised when building or parsing a lot number
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LotNumberError {
    #[error("lot number '{0}' must have the form <id>-<party>-<batch>")]
    Malformed(String),

    #[error("lot number '{0}' does not start with a numeric id")]
    InvalidId(String),

    #[error("invalid party code '{code}': {reason}")]
    InvalidPartyCode { code: String, reason: &'static str },

    #[error("invalid batch identifier '{batch_id}': {reason}")]
    InvalidBatchId { batch_id: String, reason: &'static str },
}

fn check_components(party: &str, batch_id: &str) -> Result<(), LotNumberError> {
    validate_party_code(party).map_err(|reason| LotNumberError::InvalidPartyCode {
        code: party.to_string(),
        reason,
    })?;
    validate_batch_identifier(batch_id).map_err(|reason| LotNumberError::InvalidBatchId {
        batch_id: batch_id.to_string(),
        reason,
    })
}

fn split_lot_number(raw: &str) -> Result<(i32, &str, &str), LotNumberError> {
    let mut parts = raw.splitn(3, '-');
    let (Some(id), Some(party), Some(batch_id)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(LotNumberError::Malformed(raw.to_string()));
    };
    let id = id
        .parse::<i32>()
        .map_err(|_| LotNumberError::InvalidId(raw.to_string()))?;
    check_components(party, batch_id)?;
    Ok((id, party, batch_id))
}

/// Identifier of a supplier's physical batch of one ingredient
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IngredientLotNumber {
    ingredient_id: IngredientId,
    supplier_id: String,
    batch_id: String,
}

impl IngredientLotNumber {
    pub fn new(
        ingredient_id: IngredientId,
        supplier_id: impl Into<String>,
        batch_id: impl Into<String>,
    ) -> Result<Self, LotNumberError> {
        let supplier_id = supplier_id.into();
        let batch_id = batch_id.into();
        check_components(&supplier_id, &batch_id)?;
        Ok(Self {
            ingredient_id,
            supplier_id,
            batch_id,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, LotNumberError> {
        let (ingredient_id, supplier_id, batch_id) = split_lot_number(raw)?;
        Ok(Self {
            ingredient_id,
            supplier_id: supplier_id.to_string(),
            batch_id: batch_id.to_string(),
        })
    }

    pub fn ingredient_id(&self) -> IngredientId {
        self.ingredient_id
    }

    pub fn supplier_id(&self) -> &str {
        &self.supplier_id
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

impl std::fmt::Display for IngredientLotNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.ingredient_id, self.supplier_id, self.batch_id)
    }
}

impl std::str::FromStr for IngredientLotNumber {
    type Err = LotNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IngredientLotNumber {
    type Error = LotNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IngredientLotNumber> for String {
    fn from(lot: IngredientLotNumber) -> Self {
        lot.to_string()
    }
}

/// Identifier of one production run of a product
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductLotNumber {
    product_id: ProductId,
    manufacturer_id: String,
    batch_id: String,
}

impl ProductLotNumber {
    pub fn new(
        product_id: ProductId,
        manufacturer_id: impl Into<String>,
        batch_id: impl Into<String>,
    ) -> Result<Self, LotNumberError> {
        let manufacturer_id = manufacturer_id.into();
        let batch_id = batch_id.into();
        check_components(&manufacturer_id, &batch_id)?;
        Ok(Self {
            product_id,
            manufacturer_id,
            batch_id,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, LotNumberError> {
        let (product_id, manufacturer_id, batch_id) = split_lot_number(raw)?;
        Ok(Self {
            product_id,
            manufacturer_id: manufacturer_id.to_string(),
            batch_id: batch_id.to_string(),
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn manufacturer_id(&self) -> &str {
        &self.manufacturer_id
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

impl std::fmt::Display for ProductLotNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.product_id, self.manufacturer_id, self.batch_id)
    }
}

impl std::str::FromStr for ProductLotNumber {
    type Err = LotNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductLotNumber {
    type Error = LotNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductLotNumber> for String {
    fn from(lot: ProductLotNumber) -> Self {
        lot.to_string()
    }
}

/// A supplier's physical lot of one ingredient. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientBatch {
    pub lot_number: IngredientLotNumber,
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    pub expiration_date: NaiveDate,
}

/// A recorded consumption: `quantity_used` of an ingredient lot went into a product lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub product_lot_number: ProductLotNumber,
    pub ingredient_lot_number: IngredientLotNumber,
    pub quantity_used: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingredient_lot_number_format() {
        let lot = IngredientLotNumber::new(101, "21", "B0001").unwrap();
        assert_eq!(lot.to_string(), "101-21-B0001");
    }

    #[test]
    fn test_product_lot_number_format() {
        let lot = ProductLotNumber::new(100, "MFG001", "B0901").unwrap();
        assert_eq!(lot.to_string(), "100-MFG001-B0901");
    }

    #[test]
    fn test_parse_keeps_hyphens_in_batch_id() {
        let lot = IngredientLotNumber::parse("7-S1-2024-01-A").unwrap();
        assert_eq!(lot.ingredient_id(), 7);
        assert_eq!(lot.supplier_id(), "S1");
        assert_eq!(lot.batch_id(), "2024-01-A");
        assert_eq!(lot.to_string(), "7-S1-2024-01-A");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            ProductLotNumber::parse("100-MFG001"),
            Err(LotNumberError::Malformed(_))
        ));
        assert!(matches!(
            ProductLotNumber::parse("abc-MFG001-B1"),
            Err(LotNumberError::InvalidId(_))
        ));
        assert!(matches!(
            ProductLotNumber::parse("100--B1"),
            Err(LotNumberError::InvalidPartyCode { .. })
        ));
        assert!(matches!(
            ProductLotNumber::parse("100-MFG001-"),
            Err(LotNumberError::InvalidBatchId { .. })
        ));
    }

    #[test]
    fn test_party_code_with_hyphen_rejected() {
        assert!(IngredientLotNumber::new(1, "S-1", "B1").is_err());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let lot = IngredientLotNumber::new(5, "S9", "LOT-7").unwrap();
        let json = serde_json::to_string(&lot).unwrap();
        assert_eq!(json, "\"5-S9-LOT-7\"");
        let back: IngredientLotNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lot);
    }
}
