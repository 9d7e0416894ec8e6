//! Production service: turns a recipe run into a product batch
//!
//! Order of a run:
//! 1. resolve and scale the recipe
//! 2. compatibility check over the flattened ingredient set; conflicts are
//!    logged to the health-risk log and nothing else happens
//! 3. one transaction that locks the manufacturer's stock, allocates every
//!    line, debits rows, and writes the batch with its lineage edges
//!
//! Step 3 is retried on lock contention up to the configured bound.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_compatible, flattened_ingredient_set, plan_production, produced_quantity, scale_recipe,
    validate_positive_quantity, validate_production_dates, validate_production_start, AllocationPolicy,
    Compatibility, DemandLine, IngredientId, LineageEdge, ProductId, ProductLotNumber, ProductionError, Recipe,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::catalog::{ensure_party, fetch_product, load_rules};
use super::db::{is_contention, is_unique_violation, set_lock_timeout};
use super::formulation::load_book;
use super::inventory::{apply_debits, load_locked_stock};
use super::recipe::RecipeService;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::ActorRole;

#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    inventory: InventoryConfig,
}

/// Lot selection for one recipe ingredient
#[derive(Debug, Clone, Deserialize)]
pub struct LinePolicy {
    pub ingredient_id: IngredientId,
    #[serde(flatten)]
    pub policy: AllocationPolicy,
}

#[derive(Debug, Deserialize)]
pub struct ProduceBatchInput {
    pub product_id: ProductId,
    /// Defaults to the product's active recipe
    pub recipe_id: Option<Uuid>,
    pub batch_id: String,
    pub multiplier: Decimal,
    pub production_date: NaiveDate,
    pub expiration_date: NaiveDate,
    /// Ingredients not listed use FEFO
    #[serde(default)]
    pub policies: Vec<LinePolicy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductBatchRecord {
    pub lot_number: ProductLotNumber,
    pub product_id: ProductId,
    pub manufacturer_id: String,
    pub recipe_id: Uuid,
    pub multiplier: Decimal,
    pub quantity_produced: Decimal,
    pub production_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub consumed: Vec<LineageEdge>,
}

#[derive(Debug, FromRow)]
struct ProductBatchRow {
    lot_number: String,
    product_id: i32,
    manufacturer_id: String,
    recipe_id: Uuid,
    multiplier: Decimal,
    quantity_produced: Decimal,
    production_date: NaiveDate,
    expiration_date: NaiveDate,
}

/// Everything a run needs once the recipe is resolved and checked
struct RunPlan<'a> {
    manufacturer_id: &'a str,
    lot_number: &'a ProductLotNumber,
    recipe: &'a Recipe,
    input: &'a ProduceBatchInput,
    quantity_produced: Decimal,
    demand: Vec<DemandLine>,
    policies: HashMap<IngredientId, AllocationPolicy>,
}

/// One health-risk log row per conflicting pair, keyed by the provisional lot
#[derive(Debug, Clone, PartialEq, Eq)]
struct HealthRiskRow {
    product_lot_number: String,
    ingredient_a: IngredientId,
    ingredient_b: IngredientId,
}

fn health_risk_rows(lot_number: &ProductLotNumber, compatibility: &Compatibility) -> Vec<HealthRiskRow> {
    match compatibility {
        Compatibility::Compatible => Vec::new(),
        Compatibility::Conflict(pairs) => pairs
            .iter()
            .map(|pair| HealthRiskRow {
                product_lot_number: lot_number.to_string(),
                ingredient_a: pair.first(),
                ingredient_b: pair.second(),
            })
            .collect(),
    }
}

fn policy_map(policies: &[LinePolicy], recipe: &Recipe) -> AppResult<HashMap<IngredientId, AllocationPolicy>> {
    let mut map = HashMap::with_capacity(policies.len());
    for line in policies {
        if !recipe.lines.iter().any(|l| l.ingredient_id == line.ingredient_id) {
            return Err(AppError::validation(
                "policies",
                format!("Ingredient {} is not in the recipe", line.ingredient_id),
            ));
        }
        if map.insert(line.ingredient_id, line.policy.clone()).is_some() {
            return Err(AppError::validation(
                "policies",
                format!("Ingredient {} has more than one policy", line.ingredient_id),
            ));
        }
    }
    Ok(map)
}

impl ProductionService {
    pub fn new(db: PgPool, inventory: InventoryConfig) -> Self {
        Self { db, inventory }
    }

    /// Produce a batch, consuming ingredient lots by recipe
    ///
    /// Lots are allocated as of the production date, which may not precede
    /// `today`.
    pub async fn produce_batch(
        &self,
        manufacturer_id: &str,
        input: ProduceBatchInput,
        today: NaiveDate,
    ) -> AppResult<ProductBatchRecord> {
        validate_positive_quantity(input.multiplier).map_err(|msg| AppError::validation("multiplier", msg))?;
        validate_production_start(input.production_date, today)
            .map_err(|msg| AppError::InvalidState(msg.to_string()))?;
        validate_production_dates(input.production_date, input.expiration_date)
            .map_err(|msg| AppError::validation("expiration_date", msg))?;
        let lot_number = ProductLotNumber::new(input.product_id, manufacturer_id, input.batch_id.trim())?;

        let product = fetch_product(&self.db, input.product_id).await?;
        if product.manufacturer_id != manufacturer_id {
            return Err(AppError::Unauthorized(format!(
                "Product {} belongs to another manufacturer",
                product.id
            )));
        }

        let recipes = RecipeService::new(self.db.clone());
        let recipe = match input.recipe_id {
            Some(recipe_id) => recipes.get_recipe(recipe_id).await?,
            None => recipes.active_recipe(product.id).await?,
        };
        if recipe.product_id != product.id || recipe.manufacturer_id != manufacturer_id {
            return Err(AppError::InvalidState(format!(
                "Recipe {} is not a recipe of product {} by {}",
                recipe.id, product.id, manufacturer_id
            )));
        }

        if self.batch_exists(&lot_number).await? {
            return Err(AppError::DuplicateEntry(format!("product lot {}", lot_number)));
        }

        let ingredient_ids: Vec<IngredientId> = recipe.lines.iter().map(|l| l.ingredient_id).collect();
        let book = load_book(&self.db, &ingredient_ids).await?;
        let flattened = flattened_ingredient_set(&recipe.lines, &book, input.production_date);
        let rules = load_rules(&self.db).await?;
        let compatibility = check_compatible(&flattened, &rules);
        let risks = health_risk_rows(&lot_number, &compatibility);
        if let Compatibility::Conflict(pairs) = compatibility {
            self.log_health_risks(manufacturer_id, &risks).await?;
            tracing::warn!(
                manufacturer = manufacturer_id,
                lot = %lot_number,
                "Batch rejected, {} incompatible pair(s)",
                pairs.len()
            );
            return Err(AppError::Conflict {
                lot_number: lot_number.to_string(),
                pairs,
            });
        }

        let plan = RunPlan {
            manufacturer_id,
            lot_number: &lot_number,
            recipe: &recipe,
            input: &input,
            quantity_produced: produced_quantity(product.standard_batch_size, input.multiplier)?,
            demand: scale_recipe(&recipe.lines, input.multiplier)?,
            policies: policy_map(&input.policies, &recipe)?,
        };

        let max_attempts = self.inventory.allocation_max_retries.max(1);
        let mut attempt = 1;
        loop {
            match self.run(&plan).await {
                Err(AppError::DatabaseError(e)) if is_contention(&e) => {
                    if attempt >= max_attempts {
                        tracing::warn!(lot = %lot_number, attempt, "Giving up on contended production run");
                        return Err(AppError::Contention);
                    }
                    tracing::warn!(lot = %lot_number, attempt, "Production run hit lock contention, retrying");
                    tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt))).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// One attempt at the allocation transaction
    async fn run(&self, plan: &RunPlan<'_>) -> AppResult<ProductBatchRecord> {
        let mut tx = self.db.begin().await?;
        set_lock_timeout(&mut *tx, self.inventory.lock_timeout_ms).await?;

        let ingredient_ids: Vec<IngredientId> = plan.demand.iter().map(|d| d.ingredient_id).collect();
        let mut stock = load_locked_stock(&mut *tx, plan.manufacturer_id, &ingredient_ids).await?;

        let allocation = match plan_production(&mut stock, &plan.demand, &plan.policies, plan.input.production_date) {
            Ok(allocation) => allocation,
            Err(ProductionError::Shortfall(shortages)) => {
                for shortage in &shortages {
                    tracing::warn!(lot = %plan.lot_number, "Batch rejected: {}", shortage);
                }
                return Err(AppError::Shortfall(shortages));
            }
            Err(e) => return Err(e.into()),
        };

        apply_debits(&mut *tx, &allocation.debits()).await?;

        sqlx::query(
            r#"
            INSERT INTO product_batches
                (lot_number, product_id, manufacturer_id, batch_id, recipe_id, multiplier,
                 quantity_produced, production_date, expiration_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(plan.lot_number.to_string())
        .bind(plan.lot_number.product_id())
        .bind(plan.manufacturer_id)
        .bind(plan.lot_number.batch_id())
        .bind(plan.recipe.id)
        .bind(plan.input.multiplier)
        .bind(plan.quantity_produced)
        .bind(plan.input.production_date)
        .bind(plan.input.expiration_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateEntry(format!("product lot {}", plan.lot_number))
            } else {
                e.into()
            }
        })?;

        let edges = allocation.edges(plan.lot_number);
        for edge in &edges {
            sqlx::query(
                r#"
                INSERT INTO product_ingredient_batches (product_lot_number, ingredient_lot_number, quantity_used)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(edge.product_lot_number.to_string())
            .bind(edge.ingredient_lot_number.to_string())
            .bind(edge.quantity_used)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            manufacturer = plan.manufacturer_id,
            lot = %plan.lot_number,
            lots_consumed = edges.len(),
            "Product batch produced"
        );

        Ok(ProductBatchRecord {
            lot_number: plan.lot_number.clone(),
            product_id: plan.lot_number.product_id(),
            manufacturer_id: plan.manufacturer_id.to_string(),
            recipe_id: plan.recipe.id,
            multiplier: plan.input.multiplier,
            quantity_produced: plan.quantity_produced,
            production_date: plan.input.production_date,
            expiration_date: plan.input.expiration_date,
            consumed: edges,
        })
    }

    async fn batch_exists(&self, lot_number: &ProductLotNumber) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, String>("SELECT lot_number FROM product_batches WHERE lot_number = $1")
            .bind(lot_number.to_string())
            .fetch_optional(&self.db)
            .await?;
        Ok(found.is_some())
    }

    /// Record a rejected attempt, committed on its own
    async fn log_health_risks(&self, manufacturer_id: &str, risks: &[HealthRiskRow]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        ensure_party(&mut *tx, ActorRole::Manufacturer, manufacturer_id).await?;
        for risk in risks {
            sqlx::query(
                r#"
                INSERT INTO health_risk_log (product_lot_number, ingredient_a, ingredient_b, manufacturer_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&risk.product_lot_number)
            .bind(risk.ingredient_a)
            .bind(risk.ingredient_b)
            .bind(manufacturer_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// A produced batch with the lots it consumed
    pub async fn get_batch(&self, lot_number: &ProductLotNumber) -> AppResult<ProductBatchRecord> {
        let row = sqlx::query_as::<_, ProductBatchRow>(
            r#"
            SELECT lot_number, product_id, manufacturer_id, recipe_id, multiplier, quantity_produced,
                   production_date, expiration_date
            FROM product_batches
            WHERE lot_number = $1
            "#,
        )
        .bind(lot_number.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product lot {}", lot_number)))?;

        let consumed = sqlx::query_as::<_, (String, Decimal)>(
            r#"
            SELECT ingredient_lot_number, quantity_used
            FROM product_ingredient_batches
            WHERE product_lot_number = $1
            ORDER BY ingredient_lot_number
            "#,
        )
        .bind(&row.lot_number)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(|(ingredient_lot, quantity_used)| {
            Ok(LineageEdge {
                product_lot_number: lot_number.clone(),
                ingredient_lot_number: ingredient_lot
                    .parse()
                    .map_err(|e| AppError::Internal(format!("Stored lot number is invalid: {}", e)))?,
                quantity_used,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

        Ok(ProductBatchRecord {
            lot_number: lot_number.clone(),
            product_id: row.product_id,
            manufacturer_id: row.manufacturer_id,
            recipe_id: row.recipe_id,
            multiplier: row.multiplier,
            quantity_produced: row.quantity_produced,
            production_date: row.production_date,
            expiration_date: row.expiration_date,
            consumed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{IngredientPair, RecipeLine};

    fn recipe() -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            product_id: 100,
            manufacturer_id: "MFG001".to_string(),
            creation_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            lines: vec![
                RecipeLine { ingredient_id: 1, quantity: Decimal::from(15) },
                RecipeLine { ingredient_id: 2, quantity: Decimal::from(1) },
            ],
        }
    }

    #[test]
    fn test_policy_map_rejects_unknown_ingredient() {
        let policies = vec![LinePolicy { ingredient_id: 9, policy: AllocationPolicy::Fefo }];
        assert!(policy_map(&policies, &recipe()).is_err());
    }

    #[test]
    fn test_policy_map_rejects_duplicates() {
        let policies = vec![
            LinePolicy { ingredient_id: 1, policy: AllocationPolicy::Fefo },
            LinePolicy { ingredient_id: 1, policy: AllocationPolicy::Fefo },
        ];
        assert!(policy_map(&policies, &recipe()).is_err());
    }

    #[test]
    fn test_conflict_yields_one_log_row_per_pair() {
        let lot = ProductLotNumber::new(100, "MFG001", "B7").unwrap();
        let flattened = [1, 2, 5, 9].into_iter().collect();
        let rules = vec![IngredientPair::new(9, 1).unwrap(), IngredientPair::new(2, 5).unwrap()];
        let rows = health_risk_rows(&lot, &check_compatible(&flattened, &rules));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.product_lot_number == "100-MFG001-B7"));
        assert!(rows.iter().all(|r| r.ingredient_a < r.ingredient_b));
        assert!(rows.iter().any(|r| (r.ingredient_a, r.ingredient_b) == (1, 9)));
        assert!(rows.iter().any(|r| (r.ingredient_a, r.ingredient_b) == (2, 5)));
    }

    #[test]
    fn test_compatible_run_logs_nothing() {
        let lot = ProductLotNumber::new(100, "MFG001", "B8").unwrap();
        let flattened = [1, 2].into_iter().collect();
        let rules = vec![IngredientPair::new(1, 3).unwrap()];
        assert!(health_risk_rows(&lot, &check_compatible(&flattened, &rules)).is_empty());
    }

    #[test]
    fn test_line_policy_wire_format() {
        let line: LinePolicy =
            serde_json::from_str(r#"{"ingredient_id": 1, "policy": "manual", "lots": ["1-S1-B7"]}"#).unwrap();
        assert!(matches!(line.policy, AllocationPolicy::Manual { ref lots } if lots[0].batch_id() == "B7"));
    }
}
