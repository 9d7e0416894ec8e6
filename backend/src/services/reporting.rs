//! Reporting service: cost, spend, ingredient listings, product comparison
//! and health-risk queries. Read-only.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_compatible, compare_products, flatten_for_listing, flattened_ingredient_set, Compatibility,
    IngredientId, ProductId, ProductLotNumber, Recipe,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::catalog::{fetch_product, load_rules};
use super::formulation::load_book;
use super::recipe::RecipeService;
use crate::error::{AppError, AppResult};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Total paid to one supplier for lots a manufacturer consumed
#[derive(Debug, Serialize, FromRow)]
pub struct SupplierSpend {
    pub supplier_id: String,
    pub supplier_name: String,
    pub total_spent: Decimal,
}

#[derive(Debug, Serialize, FromRow)]
pub struct UnitCost {
    pub product_lot_number: String,
    pub produced_units: Decimal,
    pub total_cost: Decimal,
    pub unit_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub struct NamedComponent {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub quantity: Decimal,
}

#[derive(Debug, Serialize)]
pub struct NamedIngredient {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub quantity: Decimal,
    pub components: Vec<NamedComponent>,
}

/// A product's active recipe, compounds expanded one level
#[derive(Debug, Serialize)]
pub struct ProductIngredientListing {
    pub manufacturer_id: String,
    pub manufacturer_name: String,
    pub category_name: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub recipe_id: Uuid,
    pub ingredients: Vec<NamedIngredient>,
}

#[derive(Debug, Deserialize)]
pub struct ListingFilter {
    pub manufacturer_id: Option<String>,
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub first: ProductId,
    pub second: ProductId,
    pub on: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ProductComparison {
    pub first: ProductId,
    pub second: ProductId,
    pub result: Compatibility,
}

#[derive(Debug, Serialize, FromRow)]
pub struct ManufacturerSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct BatchIngredient {
    pub ingredient_name: String,
    pub ingredient_lot_number: String,
}

#[derive(Debug, Serialize)]
pub struct LastBatchIngredients {
    pub product_id: ProductId,
    pub production_date: NaiveDate,
    pub product_lot_numbers: Vec<String>,
    pub ingredients: Vec<BatchIngredient>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct HealthRiskEntry {
    pub id: i64,
    pub product_lot_number: String,
    pub ingredient_a: i32,
    pub ingredient_b: i32,
    pub manufacturer_id: String,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExcludedIngredient {
    pub ingredient_id: IngredientId,
    pub name: String,
}

#[derive(Debug, FromRow)]
struct ProductHeaderRow {
    product_id: i32,
    product_name: String,
    manufacturer_id: String,
    manufacturer_name: String,
    category_name: String,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn ingredient_names(&self, ids: &[IngredientId]) -> AppResult<HashMap<IngredientId, String>> {
        let rows = sqlx::query_as::<_, (i32, String)>("SELECT id, name FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Spend per supplier across every batch the manufacturer produced
    pub async fn supplier_spend(&self, manufacturer_id: &str) -> AppResult<Vec<SupplierSpend>> {
        Ok(sqlx::query_as::<_, SupplierSpend>(
            r#"
            SELECT s.id AS supplier_id, s.name AS supplier_name,
                   SUM(pib.quantity_used * ib.cost_per_unit) AS total_spent
            FROM product_batches pb
            JOIN product_ingredient_batches pib ON pib.product_lot_number = pb.lot_number
            JOIN ingredient_batches ib ON ib.lot_number = pib.ingredient_lot_number
            JOIN suppliers s ON s.id = ib.supplier_id
            WHERE pb.manufacturer_id = $1
            GROUP BY s.id, s.name
            ORDER BY total_spent DESC, s.id
            "#,
        )
        .bind(manufacturer_id)
        .fetch_all(&self.db)
        .await?)
    }

    /// Ingredient cost of a product lot divided by units produced
    pub async fn unit_cost(&self, manufacturer_id: &str, lot_number: &ProductLotNumber) -> AppResult<UnitCost> {
        if lot_number.manufacturer_id() != manufacturer_id {
            return Err(AppError::Unauthorized(format!(
                "Product lot {} belongs to another manufacturer",
                lot_number
            )));
        }

        sqlx::query_as::<_, UnitCost>(
            r#"
            SELECT pb.lot_number AS product_lot_number,
                   pb.quantity_produced AS produced_units,
                   SUM(pib.quantity_used * ib.cost_per_unit) AS total_cost,
                   SUM(pib.quantity_used * ib.cost_per_unit) / pb.quantity_produced AS unit_cost
            FROM product_batches pb
            JOIN product_ingredient_batches pib ON pib.product_lot_number = pb.lot_number
            JOIN ingredient_batches ib ON ib.lot_number = pib.ingredient_lot_number
            WHERE pb.lot_number = $1
            GROUP BY pb.lot_number, pb.quantity_produced
            "#,
        )
        .bind(lot_number.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product lot {}", lot_number)))
    }

    async fn listing_for(&self, header: ProductHeaderRow, recipe: Recipe, on: NaiveDate) -> AppResult<ProductIngredientListing> {
        let top_level: Vec<IngredientId> = recipe.lines.iter().map(|l| l.ingredient_id).collect();
        let book = load_book(&self.db, &top_level).await?;
        let listed = flatten_for_listing(&recipe.lines, &book, on);

        let all_ids: Vec<IngredientId> = listed
            .iter()
            .flat_map(|l| std::iter::once(l.ingredient_id).chain(l.components.iter().map(|c| c.ingredient_id)))
            .collect();
        let names = self.ingredient_names(&all_ids).await?;
        let name_of = |id: IngredientId| names.get(&id).cloned().unwrap_or_else(|| id.to_string());

        Ok(ProductIngredientListing {
            manufacturer_id: header.manufacturer_id,
            manufacturer_name: header.manufacturer_name,
            category_name: header.category_name,
            product_id: header.product_id,
            product_name: header.product_name,
            recipe_id: recipe.id,
            ingredients: listed
                .into_iter()
                .map(|l| NamedIngredient {
                    name: name_of(l.ingredient_id),
                    ingredient_id: l.ingredient_id,
                    quantity: l.quantity,
                    components: l
                        .components
                        .into_iter()
                        .map(|c| NamedComponent {
                            name: name_of(c.ingredient_id),
                            ingredient_id: c.ingredient_id,
                            quantity: c.quantity,
                        })
                        .collect(),
                })
                .collect(),
        })
    }

    async fn product_headers(&self, manufacturer_id: Option<&str>, product_id: Option<ProductId>) -> AppResult<Vec<ProductHeaderRow>> {
        Ok(sqlx::query_as::<_, ProductHeaderRow>(
            r#"
            SELECT p.id AS product_id, p.name AS product_name, m.id AS manufacturer_id,
                   m.name AS manufacturer_name, c.name AS category_name
            FROM products p
            JOIN manufacturers m ON m.id = p.manufacturer_id
            JOIN categories c ON c.id = p.category_id
            WHERE ($1::VARCHAR IS NULL OR p.manufacturer_id = $1)
              AND ($2::INTEGER IS NULL OR p.id = $2)
            ORDER BY m.id, c.name, p.id
            "#,
        )
        .bind(manufacturer_id)
        .bind(product_id)
        .fetch_all(&self.db)
        .await?)
    }

    /// Ingredient listing of one product's active recipe
    pub async fn product_ingredients(&self, product_id: ProductId, on: NaiveDate) -> AppResult<ProductIngredientListing> {
        let header = self
            .product_headers(None, Some(product_id))
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
        let recipe = RecipeService::new(self.db.clone()).active_recipe(product_id).await?;
        self.listing_for(header, recipe, on).await
    }

    /// Listings of every product with a recipe, by manufacturer, category, product
    pub async fn ingredient_listing(&self, filter: ListingFilter, today: NaiveDate) -> AppResult<Vec<ProductIngredientListing>> {
        let on = filter.on.unwrap_or(today);
        let recipes = RecipeService::new(self.db.clone());
        let mut listings = Vec::new();
        for header in self.product_headers(filter.manufacturer_id.as_deref(), None).await? {
            match recipes.active_recipe(header.product_id).await {
                Ok(recipe) => listings.push(self.listing_for(header, recipe, on).await?),
                Err(AppError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(listings)
    }

    async fn flattened_product(&self, product_id: ProductId, on: NaiveDate) -> AppResult<BTreeSet<IngredientId>> {
        fetch_product(&self.db, product_id).await?;
        let recipe = RecipeService::new(self.db.clone()).active_recipe(product_id).await?;
        let top_level: Vec<IngredientId> = recipe.lines.iter().map(|l| l.ingredient_id).collect();
        let book = load_book(&self.db, &top_level).await?;
        Ok(flattened_ingredient_set(&recipe.lines, &book, on))
    }

    /// Whether two products' flattened ingredients could share a batch
    pub async fn compare(&self, query: CompareQuery, today: NaiveDate) -> AppResult<ProductComparison> {
        let on = query.on.unwrap_or(today);
        let first = self.flattened_product(query.first, on).await?;
        let second = self.flattened_product(query.second, on).await?;
        let rules = load_rules(&self.db).await?;

        Ok(ProductComparison {
            first: query.first,
            second: query.second,
            result: compare_products(&first, &second, &rules),
        })
    }

    /// Manufacturers that never consumed a lot from the supplier
    pub async fn manufacturers_not_supplied_by(&self, supplier_id: &str) -> AppResult<Vec<ManufacturerSummary>> {
        Ok(sqlx::query_as::<_, ManufacturerSummary>(
            r#"
            SELECT m.id, m.name
            FROM manufacturers m
            WHERE m.id NOT IN (
                SELECT DISTINCT pb.manufacturer_id
                FROM product_batches pb
                JOIN product_ingredient_batches pib ON pib.product_lot_number = pb.lot_number
                JOIN ingredient_batches ib ON ib.lot_number = pib.ingredient_lot_number
                WHERE ib.supplier_id = $1
            )
            ORDER BY m.id
            "#,
        )
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?)
    }

    /// Ingredient lots used on the most recent production date of a product
    pub async fn last_batch_ingredients(&self, product_id: ProductId) -> AppResult<LastBatchIngredients> {
        let (production_date, product_lot_numbers) = sqlx::query_as::<_, (NaiveDate, Vec<String>)>(
            r#"
            SELECT production_date, ARRAY_AGG(lot_number::TEXT ORDER BY lot_number)
            FROM product_batches
            WHERE product_id = $1
            GROUP BY production_date
            ORDER BY production_date DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batches of product {}", product_id)))?;

        let ingredients = sqlx::query_as::<_, BatchIngredient>(
            r#"
            SELECT i.name AS ingredient_name, pib.ingredient_lot_number
            FROM product_ingredient_batches pib
            JOIN ingredient_batches ib ON ib.lot_number = pib.ingredient_lot_number
            JOIN ingredients i ON i.id = ib.ingredient_id
            WHERE pib.product_lot_number = ANY($1)
            ORDER BY i.name, pib.ingredient_lot_number
            "#,
        )
        .bind(&product_lot_numbers)
        .fetch_all(&self.db)
        .await?;

        Ok(LastBatchIngredients {
            product_id,
            production_date,
            product_lot_numbers,
            ingredients,
        })
    }

    /// Ingredients that may not be added to an existing batch
    pub async fn excluded_ingredients(&self, lot_number: &ProductLotNumber) -> AppResult<Vec<ExcludedIngredient>> {
        let in_batch: BTreeSet<IngredientId> = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT ib.ingredient_id
            FROM product_ingredient_batches pib
            JOIN ingredient_batches ib ON ib.lot_number = pib.ingredient_lot_number
            WHERE pib.product_lot_number = $1
            "#,
        )
        .bind(lot_number.to_string())
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();
        if in_batch.is_empty() {
            return Err(AppError::NotFound(format!("Product lot {}", lot_number)));
        }

        let rules = load_rules(&self.db).await?;
        let excluded: BTreeSet<IngredientId> = rules
            .iter()
            .filter_map(|rule| {
                let (a, b) = (rule.first(), rule.second());
                match (in_batch.contains(&a), in_batch.contains(&b)) {
                    (true, false) => Some(b),
                    (false, true) => Some(a),
                    _ => None,
                }
            })
            .collect();

        // A batch that already holds both sides of a rule predates the rule
        if let Compatibility::Conflict(pairs) = check_compatible(&in_batch, &rules) {
            tracing::warn!(lot = %lot_number, "Batch already combines {} banned pair(s)", pairs.len());
        }

        let ids: Vec<IngredientId> = excluded.into_iter().collect();
        let names = self.ingredient_names(&ids).await?;
        Ok(ids
            .into_iter()
            .map(|id| ExcludedIngredient {
                name: names.get(&id).cloned().unwrap_or_default(),
                ingredient_id: id,
            })
            .collect())
    }

    pub async fn health_risks(&self) -> AppResult<Vec<HealthRiskEntry>> {
        Ok(sqlx::query_as::<_, HealthRiskEntry>(
            r#"
            SELECT id, product_lot_number, ingredient_a, ingredient_b, manufacturer_id, logged_at
            FROM health_risk_log
            ORDER BY logged_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?)
    }
}
