//! Formulation service: versioned compositions of compound ingredients

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    check_no_overlap, effective_range, next_version, validate_composition, validate_non_negative_amount,
    validate_positive_quantity, DateRange, Formulation, FormulationBook, FormulationLine, IngredientId,
    IngredientKind, VersionWindow,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::db::{is_exclusion_violation, set_lock_timeout};
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};

/// Formulation service
#[derive(Clone)]
pub struct FormulationService {
    db: PgPool,
    inventory: InventoryConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateFormulationInput {
    pub compound_id: IngredientId,
    pub effective_start: NaiveDate,
    pub effective_end: NaiveDate,
    pub unit_price: Decimal,
    pub pack_size: Decimal,
    pub lines: Vec<FormulationLine>,
}

#[derive(Debug, FromRow)]
struct FormulationRow {
    id: Uuid,
    supplier_id: String,
    compound_id: i32,
    version: i32,
    effective_start: NaiveDate,
    effective_end: NaiveDate,
    unit_price: Decimal,
    pack_size: Decimal,
}

#[derive(Debug, FromRow)]
struct FormulationLineRow {
    formulation_id: Uuid,
    atomic_ingredient_id: i32,
    quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct LineIngredientRow {
    id: i32,
    kind: String,
    supplied: bool,
}

fn row_range(start: NaiveDate, end: NaiveDate) -> AppResult<DateRange> {
    DateRange::new(start, end).ok_or_else(|| AppError::Internal(format!("Stored range {} > {}", start, end)))
}

fn assemble(rows: Vec<FormulationRow>, lines: Vec<FormulationLineRow>) -> AppResult<Vec<Formulation>> {
    let mut lines_by_id: HashMap<Uuid, Vec<FormulationLine>> = HashMap::new();
    for line in lines {
        lines_by_id.entry(line.formulation_id).or_default().push(FormulationLine {
            atomic_ingredient_id: line.atomic_ingredient_id,
            quantity: line.quantity,
        });
    }

    rows.into_iter()
        .map(|row| {
            Ok(Formulation {
                id: row.id,
                effective: row_range(row.effective_start, row.effective_end)?,
                compound_id: row.compound_id,
                supplier_id: row.supplier_id,
                version: row.version,
                unit_price: row.unit_price,
                pack_size: row.pack_size,
                lines: lines_by_id.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect()
}

const FORMULATION_COLUMNS: &str = "id, supplier_id, compound_id, version, effective_start, effective_end, unit_price, pack_size";

async fn load_lines(db: &PgPool, ids: &[Uuid]) -> AppResult<Vec<FormulationLineRow>> {
    Ok(sqlx::query_as::<_, FormulationLineRow>(
        r#"
        SELECT formulation_id, atomic_ingredient_id, quantity
        FROM formulation_lines
        WHERE formulation_id = ANY($1)
        ORDER BY formulation_id, quantity DESC, atomic_ingredient_id
        "#,
    )
    .bind(ids)
    .fetch_all(db)
    .await?)
}

/// Every formulation of the given compounds, for flattening
pub async fn load_book(db: &PgPool, compound_ids: &[IngredientId]) -> AppResult<FormulationBook> {
    let rows = sqlx::query_as::<_, FormulationRow>(&format!(
        "SELECT {} FROM formulations WHERE compound_id = ANY($1)",
        FORMULATION_COLUMNS
    ))
    .bind(compound_ids)
    .fetch_all(db)
    .await?;
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let lines = load_lines(db, &ids).await?;
    Ok(FormulationBook::new(assemble(rows, lines)?))
}

impl FormulationService {
    pub fn new(db: PgPool, inventory: InventoryConfig) -> Self {
        Self { db, inventory }
    }

    /// Create the next formulation version for a compound
    ///
    /// The (supplier, compound) association row stays locked from the
    /// overlap check until the insert commits.
    pub async fn create_formulation(&self, supplier_id: &str, input: CreateFormulationInput) -> AppResult<Formulation> {
        let effective = effective_range(input.effective_start, input.effective_end)?;
        let composition: Vec<(IngredientId, Decimal)> =
            input.lines.iter().map(|l| (l.atomic_ingredient_id, l.quantity)).collect();
        validate_composition(&composition).map_err(|msg| AppError::validation("lines", msg))?;
        validate_non_negative_amount(input.unit_price).map_err(|msg| AppError::validation("unit_price", msg))?;
        validate_positive_quantity(input.pack_size).map_err(|msg| AppError::validation("pack_size", msg))?;

        let mut tx = self.db.begin().await?;
        set_lock_timeout(&mut *tx, self.inventory.lock_timeout_ms).await?;

        let compound_kind = sqlx::query_scalar::<_, String>(
            r#"
            SELECT i.kind
            FROM supplier_ingredients si
            JOIN ingredients i ON i.id = si.ingredient_id
            WHERE si.supplier_id = $1 AND si.ingredient_id = $2
            FOR UPDATE OF si
            "#,
        )
        .bind(supplier_id)
        .bind(input.compound_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized(format!(
                "Supplier {} has not declared ingredient {}",
                supplier_id, input.compound_id
            ))
        })?;
        if IngredientKind::from_str(&compound_kind) != Some(IngredientKind::Compound) {
            return Err(AppError::InvalidState(format!(
                "Ingredient {} is not a compound",
                input.compound_id
            )));
        }

        let line_ids: Vec<i32> = composition.iter().map(|(id, _)| *id).collect();
        let line_ingredients = sqlx::query_as::<_, LineIngredientRow>(
            r#"
            SELECT i.id, i.kind, (si.supplier_id IS NOT NULL) AS supplied
            FROM ingredients i
            LEFT JOIN supplier_ingredients si ON si.ingredient_id = i.id AND si.supplier_id = $1
            WHERE i.id = ANY($2)
            "#,
        )
        .bind(supplier_id)
        .bind(&line_ids)
        .fetch_all(&mut *tx)
        .await?;

        for id in &line_ids {
            let row = line_ingredients
                .iter()
                .find(|r| r.id == *id)
                .ok_or_else(|| AppError::NotFound(format!("Ingredient {}", id)))?;
            if !row.supplied {
                return Err(AppError::Unauthorized(format!(
                    "Supplier {} does not supply ingredient {}",
                    supplier_id, id
                )));
            }
            if IngredientKind::from_str(&row.kind) != Some(IngredientKind::Atomic) {
                return Err(AppError::InvalidState(format!(
                    "Formulation lines must be atomic, ingredient {} is not",
                    id
                )));
            }
        }

        let windows = sqlx::query_as::<_, (i32, NaiveDate, NaiveDate)>(
            "SELECT version, effective_start, effective_end FROM formulations WHERE supplier_id = $1 AND compound_id = $2",
        )
        .bind(supplier_id)
        .bind(input.compound_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|(version, start, end)| Ok(VersionWindow { version, effective: row_range(start, end)? }))
        .collect::<AppResult<Vec<_>>>()?;

        if let Err(err) = check_no_overlap(&windows, &effective) {
            tracing::warn!(supplier = supplier_id, compound = input.compound_id, "{}", err);
            return Err(err.into());
        }
        let version = next_version(&windows);

        let formulation_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO formulations
                (supplier_id, compound_id, version, effective_start, effective_end, unit_price, pack_size)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(supplier_id)
        .bind(input.compound_id)
        .bind(version)
        .bind(effective.start)
        .bind(effective.end)
        .bind(input.unit_price)
        .bind(input.pack_size)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_exclusion_violation(&e) {
                AppError::OverlapViolation(format!("effective range {} overlaps an existing version", effective))
            } else {
                e.into()
            }
        })?;

        for line in &input.lines {
            sqlx::query(
                "INSERT INTO formulation_lines (formulation_id, atomic_ingredient_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(formulation_id)
            .bind(line.atomic_ingredient_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            supplier = supplier_id,
            compound = input.compound_id,
            version,
            "Formulation created for {}",
            effective
        );

        Ok(Formulation {
            id: formulation_id,
            compound_id: input.compound_id,
            supplier_id: supplier_id.to_string(),
            version,
            effective,
            unit_price: input.unit_price,
            pack_size: input.pack_size,
            lines: input.lines,
        })
    }

    /// Every version the supplier has created
    pub async fn list_formulations(&self, supplier_id: &str) -> AppResult<Vec<Formulation>> {
        let rows = sqlx::query_as::<_, FormulationRow>(&format!(
            "SELECT {} FROM formulations WHERE supplier_id = $1 ORDER BY compound_id, version",
            FORMULATION_COLUMNS
        ))
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let lines = load_lines(&self.db, &ids).await?;
        assemble(rows, lines)
    }

    /// The supplier's formulations in effect on `on`
    pub async fn active_formulations(&self, supplier_id: &str, on: NaiveDate) -> AppResult<Vec<Formulation>> {
        let rows = sqlx::query_as::<_, FormulationRow>(&format!(
            r#"
            SELECT {} FROM formulations
            WHERE supplier_id = $1 AND effective_start <= $2 AND effective_end >= $2
            ORDER BY compound_id
            "#,
            FORMULATION_COLUMNS
        ))
        .bind(supplier_id)
        .bind(on)
        .fetch_all(&self.db)
        .await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let lines = load_lines(&self.db, &ids).await?;
        assemble(rows, lines)
    }
}
