//! Inventory ledger service: receipts, stock reports and the locked stock
//! snapshot the allocator works on

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_positive_quantity, validate_receipt_capacity, IngredientId, IngredientLotNumber, InventoryLot, OnHand,
    ProductId,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::catalog::ensure_party;
use super::db::set_lock_timeout;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::ActorRole;

/// Inventory service for manufacturer-held stock
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    inventory: InventoryConfig,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveIngredientInput {
    pub lot_number: IngredientLotNumber,
    pub quantity: Decimal,
    /// Defaults to today
    pub received_date: Option<NaiveDate>,
}

/// One receipt row
#[derive(Debug, Clone, Serialize)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub manufacturer_id: String,
    pub lot_number: IngredientLotNumber,
    pub ingredient_id: IngredientId,
    pub received_quantity: Decimal,
    pub remaining: Decimal,
    pub expiration_date: NaiveDate,
    pub received_date: NaiveDate,
}

/// Product whose manufacturer holds less stock than one standard batch
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NearlyOutOfStock {
    pub product_id: ProductId,
    pub product_name: String,
    pub total_on_hand: Decimal,
    pub standard_batch_size: Decimal,
}

#[derive(Debug, FromRow)]
struct InventoryRow {
    id: Uuid,
    manufacturer_id: String,
    lot_number: String,
    ingredient_id: i32,
    received_quantity: Decimal,
    remaining: Decimal,
    expiration_date: NaiveDate,
    received_date: NaiveDate,
}

#[derive(Debug, FromRow)]
struct OnHandRow {
    lot_number: String,
    ingredient_name: String,
    remaining: Decimal,
    expiration_date: NaiveDate,
}

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    lot_number: String,
    remaining: Decimal,
    expiration_date: NaiveDate,
    received_date: NaiveDate,
}

fn parse_lot(raw: &str) -> AppResult<IngredientLotNumber> {
    IngredientLotNumber::parse(raw).map_err(|e| AppError::Internal(format!("Stored lot number is invalid: {}", e)))
}

impl TryFrom<InventoryRow> for InventoryRecord {
    type Error = AppError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        Ok(InventoryRecord {
            lot_number: parse_lot(&row.lot_number)?,
            id: row.id,
            manufacturer_id: row.manufacturer_id,
            ingredient_id: row.ingredient_id,
            received_quantity: row.received_quantity,
            remaining: row.remaining,
            expiration_date: row.expiration_date,
            received_date: row.received_date,
        })
    }
}

impl TryFrom<OnHandRow> for OnHand {
    type Error = AppError;

    fn try_from(row: OnHandRow) -> Result<Self, Self::Error> {
        Ok(OnHand {
            lot_number: parse_lot(&row.lot_number)?,
            ingredient_name: row.ingredient_name,
            remaining: row.remaining,
            expiration_date: row.expiration_date,
        })
    }
}

/// Lock and load a manufacturer's rows for the given ingredients
///
/// Rows are locked in id order so concurrent runs acquire them in the same
/// sequence.
pub async fn load_locked_stock(
    conn: &mut PgConnection,
    manufacturer_id: &str,
    ingredient_ids: &[IngredientId],
) -> AppResult<Vec<InventoryLot>> {
    sqlx::query_as::<_, StockRow>(
        r#"
        SELECT id, lot_number, remaining, expiration_date, received_date
        FROM inventory
        WHERE manufacturer_id = $1 AND ingredient_id = ANY($2) AND remaining > 0
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(manufacturer_id)
    .bind(ingredient_ids)
    .fetch_all(conn)
    .await?
    .into_iter()
    .map(|row| {
        Ok(InventoryLot {
            inventory_id: row.id,
            lot_number: parse_lot(&row.lot_number)?,
            remaining: row.remaining,
            expiration_date: row.expiration_date,
            received_date: row.received_date,
        })
    })
    .collect()
}

/// Subtract drawn quantities from locked rows
pub async fn apply_debits(conn: &mut PgConnection, debits: &[(Uuid, Decimal)]) -> AppResult<()> {
    for (inventory_id, quantity) in debits {
        let updated = sqlx::query("UPDATE inventory SET remaining = remaining - $2 WHERE id = $1 AND remaining >= $2")
            .bind(inventory_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
        if updated.rows_affected() != 1 {
            return Err(AppError::Internal(format!(
                "Inventory row {} changed while locked",
                inventory_id
            )));
        }
    }
    Ok(())
}

impl InventoryService {
    pub fn new(db: PgPool, inventory: InventoryConfig) -> Self {
        Self { db, inventory }
    }

    /// Receive part of an ingredient lot into the manufacturer's inventory
    ///
    /// Receipts of one lot across all manufacturers never exceed the lot's
    /// quantity; the batch row is locked while the sum is checked.
    pub async fn receive(
        &self,
        manufacturer_id: &str,
        input: ReceiveIngredientInput,
        today: NaiveDate,
    ) -> AppResult<InventoryRecord> {
        validate_positive_quantity(input.quantity).map_err(|msg| AppError::validation("quantity", msg))?;
        let lot_number = input.lot_number.to_string();

        let mut tx = self.db.begin().await?;
        set_lock_timeout(&mut *tx, self.inventory.lock_timeout_ms).await?;
        ensure_party(&mut *tx, ActorRole::Manufacturer, manufacturer_id).await?;

        let (batch_quantity, expiration_date) = sqlx::query_as::<_, (Decimal, NaiveDate)>(
            "SELECT quantity, expiration_date FROM ingredient_batches WHERE lot_number = $1 FOR UPDATE",
        )
        .bind(&lot_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ingredient lot {}", lot_number)))?;

        let already_received = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(received_quantity), 0) FROM inventory WHERE lot_number = $1",
        )
        .bind(&lot_number)
        .fetch_one(&mut *tx)
        .await?;

        if let Err(msg) = validate_receipt_capacity(batch_quantity, already_received, input.quantity) {
            tracing::warn!(
                manufacturer = manufacturer_id,
                lot = %lot_number,
                "Receipt of {} rejected, {} of {} already received",
                input.quantity,
                already_received,
                batch_quantity
            );
            return Err(AppError::InvalidState(format!(
                "{}: lot {} has {} left to receive, requested {}",
                msg,
                lot_number,
                batch_quantity - already_received,
                input.quantity
            )));
        }

        let row = sqlx::query_as::<_, InventoryRow>(
            r#"
            INSERT INTO inventory
                (manufacturer_id, lot_number, ingredient_id, received_quantity, remaining, expiration_date, received_date)
            VALUES ($1, $2, $3, $4, $4, $5, $6)
            RETURNING id, manufacturer_id, lot_number, ingredient_id, received_quantity, remaining,
                      expiration_date, received_date
            "#,
        )
        .bind(manufacturer_id)
        .bind(&lot_number)
        .bind(input.lot_number.ingredient_id())
        .bind(input.quantity)
        .bind(expiration_date)
        .bind(input.received_date.unwrap_or(today))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(manufacturer = manufacturer_id, lot = %lot_number, quantity = %input.quantity, "Ingredient received");
        row.try_into()
    }

    /// Every lot with stock left
    pub async fn on_hand(&self, manufacturer_id: &str) -> AppResult<Vec<OnHand>> {
        sqlx::query_as::<_, OnHandRow>(
            r#"
            SELECT inv.lot_number, i.name AS ingredient_name,
                   SUM(inv.remaining) AS remaining, inv.expiration_date
            FROM inventory inv
            JOIN ingredients i ON i.id = inv.ingredient_id
            WHERE inv.manufacturer_id = $1 AND inv.remaining > 0
            GROUP BY inv.lot_number, i.name, inv.expiration_date
            ORDER BY inv.expiration_date, inv.lot_number
            "#,
        )
        .bind(manufacturer_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(OnHand::try_from)
        .collect()
    }

    /// Lots with stock left that expire within the configured window
    pub async fn almost_expiring(&self, manufacturer_id: &str, today: NaiveDate) -> AppResult<Vec<OnHand>> {
        let horizon = today + Duration::days(self.inventory.almost_expiring_days);
        sqlx::query_as::<_, OnHandRow>(
            r#"
            SELECT inv.lot_number, i.name AS ingredient_name,
                   SUM(inv.remaining) AS remaining, inv.expiration_date
            FROM inventory inv
            JOIN ingredients i ON i.id = inv.ingredient_id
            WHERE inv.manufacturer_id = $1 AND inv.remaining > 0 AND inv.expiration_date <= $2
            GROUP BY inv.lot_number, i.name, inv.expiration_date
            ORDER BY inv.expiration_date, inv.lot_number
            "#,
        )
        .bind(manufacturer_id)
        .bind(horizon)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(OnHand::try_from)
        .collect()
    }

    /// Products whose manufacturer's total on-hand is below one standard batch
    pub async fn nearly_out_of_stock(&self, manufacturer_id: &str) -> AppResult<Vec<NearlyOutOfStock>> {
        Ok(sqlx::query_as::<_, NearlyOutOfStock>(
            r#"
            SELECT p.id AS product_id, p.name AS product_name,
                   COALESCE(stock.total, 0) AS total_on_hand, p.standard_batch_size
            FROM products p
            LEFT JOIN (
                SELECT manufacturer_id, SUM(remaining) AS total
                FROM inventory
                GROUP BY manufacturer_id
            ) stock ON stock.manufacturer_id = p.manufacturer_id
            WHERE p.manufacturer_id = $1
              AND COALESCE(stock.total, 0) < p.standard_batch_size
            ORDER BY p.id
            "#,
        )
        .bind(manufacturer_id)
        .fetch_all(&self.db)
        .await?)
    }

    /// Receipt rows of one lot held by the manufacturer
    pub async fn receipts_for_lot(
        &self,
        manufacturer_id: &str,
        lot_number: &IngredientLotNumber,
    ) -> AppResult<Vec<InventoryRecord>> {
        sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT id, manufacturer_id, lot_number, ingredient_id, received_quantity, remaining,
                   expiration_date, received_date
            FROM inventory
            WHERE manufacturer_id = $1 AND lot_number = $2
            ORDER BY received_date, id
            "#,
        )
        .bind(manufacturer_id)
        .bind(lot_number.to_string())
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(InventoryRecord::try_from)
        .collect()
    }
}
