//! Traceability service: recall queries over lineage edges
//!
//! Backward: which ingredient lots went into a product lot.
//! Forward: which product lots an ingredient lot went into.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{IngredientLotNumber, ProductLotNumber};
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};

/// Traceability service for recall lookups
#[derive(Clone)]
pub struct TraceabilityService {
    db: PgPool,
}

/// One ingredient lot consumed by a product lot
#[derive(Debug, Serialize, FromRow)]
pub struct ConsumedLot {
    pub ingredient_lot_number: String,
    pub ingredient_id: i32,
    pub ingredient_name: String,
    pub supplier_id: String,
    pub batch_id: String,
    pub cost_per_unit: Decimal,
    pub expiration_date: NaiveDate,
    pub quantity_used: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BackwardTrace {
    pub product_lot_number: ProductLotNumber,
    pub ingredients: Vec<ConsumedLot>,
}

/// One product lot an ingredient lot went into
#[derive(Debug, Serialize, FromRow)]
pub struct AffectedBatch {
    pub product_lot_number: String,
    pub product_id: i32,
    pub product_name: String,
    pub manufacturer_id: String,
    pub production_date: NaiveDate,
    pub quantity_used: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ForwardTrace {
    pub ingredient_lot_number: IngredientLotNumber,
    pub batches: Vec<AffectedBatch>,
}

impl TraceabilityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn trace_backward(&self, lot_number: &ProductLotNumber) -> AppResult<BackwardTrace> {
        let exists = sqlx::query_scalar::<_, String>("SELECT lot_number FROM product_batches WHERE lot_number = $1")
            .bind(lot_number.to_string())
            .fetch_optional(&self.db)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Product lot {}", lot_number)));
        }

        let ingredients = sqlx::query_as::<_, ConsumedLot>(
            r#"
            SELECT pib.ingredient_lot_number, ib.ingredient_id, i.name AS ingredient_name,
                   ib.supplier_id, ib.batch_id, ib.cost_per_unit, ib.expiration_date, pib.quantity_used
            FROM product_ingredient_batches pib
            JOIN ingredient_batches ib ON ib.lot_number = pib.ingredient_lot_number
            JOIN ingredients i ON i.id = ib.ingredient_id
            WHERE pib.product_lot_number = $1
            ORDER BY ib.ingredient_id, pib.ingredient_lot_number
            "#,
        )
        .bind(lot_number.to_string())
        .fetch_all(&self.db)
        .await?;

        Ok(BackwardTrace {
            product_lot_number: lot_number.clone(),
            ingredients,
        })
    }

    pub async fn trace_forward(&self, lot_number: &IngredientLotNumber) -> AppResult<ForwardTrace> {
        let exists = sqlx::query_scalar::<_, String>("SELECT lot_number FROM ingredient_batches WHERE lot_number = $1")
            .bind(lot_number.to_string())
            .fetch_optional(&self.db)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Ingredient lot {}", lot_number)));
        }

        let batches = sqlx::query_as::<_, AffectedBatch>(
            r#"
            SELECT pb.lot_number AS product_lot_number, pb.product_id, p.name AS product_name,
                   pb.manufacturer_id, pb.production_date, pib.quantity_used
            FROM product_ingredient_batches pib
            JOIN product_batches pb ON pb.lot_number = pib.product_lot_number
            JOIN products p ON p.id = pb.product_id
            WHERE pib.ingredient_lot_number = $1
            ORDER BY pb.production_date, pb.lot_number
            "#,
        )
        .bind(lot_number.to_string())
        .fetch_all(&self.db)
        .await?;

        Ok(ForwardTrace {
            ingredient_lot_number: lot_number.clone(),
            batches,
        })
    }
}
