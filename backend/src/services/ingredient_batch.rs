//! Ingredient lot store: supplier-created physical batches

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_expiration_horizon, validate_non_negative_amount, validate_positive_quantity, IngredientBatch,
    IngredientId, IngredientLotNumber,
};
use sqlx::{FromRow, PgPool};

use super::db::is_unique_violation;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct IngredientBatchService {
    db: PgPool,
    inventory: InventoryConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateIngredientBatchInput {
    pub ingredient_id: IngredientId,
    pub batch_id: String,
    pub quantity: Decimal,
    pub cost_per_unit: Decimal,
    pub expiration_date: NaiveDate,
}

/// Stored batch with its creation date
#[derive(Debug, Clone, Serialize)]
pub struct IngredientBatchRecord {
    #[serde(flatten)]
    pub batch: IngredientBatch,
    pub created_date: NaiveDate,
}

#[derive(Debug, FromRow)]
struct BatchRow {
    lot_number: String,
    quantity: Decimal,
    cost_per_unit: Decimal,
    expiration_date: NaiveDate,
    created_date: NaiveDate,
}

impl TryFrom<BatchRow> for IngredientBatchRecord {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let lot_number = IngredientLotNumber::parse(&row.lot_number)
            .map_err(|e| AppError::Internal(format!("Stored lot number is invalid: {}", e)))?;
        Ok(IngredientBatchRecord {
            batch: IngredientBatch {
                lot_number,
                quantity: row.quantity,
                cost_per_unit: row.cost_per_unit,
                expiration_date: row.expiration_date,
            },
            created_date: row.created_date,
        })
    }
}

const BATCH_COLUMNS: &str = "lot_number, quantity, cost_per_unit, expiration_date, created_date";

impl IngredientBatchService {
    pub fn new(db: PgPool, inventory: InventoryConfig) -> Self {
        Self { db, inventory }
    }

    /// Create a lot of an ingredient the supplier has declared
    pub async fn create_batch(
        &self,
        supplier_id: &str,
        input: CreateIngredientBatchInput,
        today: NaiveDate,
    ) -> AppResult<IngredientBatchRecord> {
        let lot_number = IngredientLotNumber::new(input.ingredient_id, supplier_id, input.batch_id.trim())?;
        validate_positive_quantity(input.quantity).map_err(|msg| AppError::validation("quantity", msg))?;
        validate_non_negative_amount(input.cost_per_unit)
            .map_err(|msg| AppError::validation("cost_per_unit", msg))?;
        validate_expiration_horizon(input.expiration_date, today, self.inventory.min_expiration_days)
            .map_err(|msg| AppError::validation("expiration_date", msg))?;

        let supplied = sqlx::query_scalar::<_, i32>(
            "SELECT ingredient_id FROM supplier_ingredients WHERE supplier_id = $1 AND ingredient_id = $2",
        )
        .bind(supplier_id)
        .bind(input.ingredient_id)
        .fetch_optional(&self.db)
        .await?;
        if supplied.is_none() {
            return Err(AppError::Unauthorized(format!(
                "Supplier {} has not declared ingredient {}",
                supplier_id, input.ingredient_id
            )));
        }

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            INSERT INTO ingredient_batches
                (lot_number, ingredient_id, supplier_id, batch_id, quantity, cost_per_unit, expiration_date, created_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(lot_number.to_string())
        .bind(lot_number.ingredient_id())
        .bind(lot_number.supplier_id())
        .bind(lot_number.batch_id())
        .bind(input.quantity)
        .bind(input.cost_per_unit)
        .bind(input.expiration_date)
        .bind(today)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry(format!("ingredient lot {}", lot_number))
            } else {
                e.into()
            }
        })?;

        tracing::info!(supplier = supplier_id, lot = %lot_number, quantity = %input.quantity, "Ingredient batch created");
        row.try_into()
    }

    pub async fn list_batches(&self, supplier_id: &str) -> AppResult<Vec<IngredientBatchRecord>> {
        sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM ingredient_batches WHERE supplier_id = $1 ORDER BY created_date DESC, lot_number",
            BATCH_COLUMNS
        ))
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(IngredientBatchRecord::try_from)
        .collect()
    }
}
