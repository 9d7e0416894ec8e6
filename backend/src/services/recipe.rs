//! Recipe service: versioned product compositions owned by a manufacturer

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_composition, IngredientId, ProductId, Recipe, RecipeLine};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::catalog::fetch_product;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeInput {
    pub product_id: ProductId,
    /// Defaults to today
    pub creation_date: Option<NaiveDate>,
    pub lines: Vec<RecipeLine>,
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    product_id: i32,
    manufacturer_id: String,
    creation_date: NaiveDate,
}

#[derive(Debug, FromRow)]
struct RecipeLineRow {
    recipe_id: Uuid,
    ingredient_id: i32,
    quantity: Decimal,
}

const RECIPE_ORDER: &str = "ORDER BY creation_date DESC, seq DESC";

impl RecipeService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn load_lines(&self, ids: &[Uuid]) -> AppResult<Vec<RecipeLineRow>> {
        Ok(sqlx::query_as::<_, RecipeLineRow>(
            r#"
            SELECT recipe_id, ingredient_id, quantity
            FROM recipe_lines
            WHERE recipe_id = ANY($1)
            ORDER BY recipe_id, quantity DESC, ingredient_id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?)
    }

    async fn with_lines(&self, rows: Vec<RecipeRow>) -> AppResult<Vec<Recipe>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut lines_by_id: HashMap<Uuid, Vec<RecipeLine>> = HashMap::new();
        for line in self.load_lines(&ids).await? {
            lines_by_id.entry(line.recipe_id).or_default().push(RecipeLine {
                ingredient_id: line.ingredient_id,
                quantity: line.quantity,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Recipe {
                lines: lines_by_id.remove(&row.id).unwrap_or_default(),
                id: row.id,
                product_id: row.product_id,
                manufacturer_id: row.manufacturer_id,
                creation_date: row.creation_date,
            })
            .collect())
    }

    /// Record a new recipe version for an owned product
    pub async fn create_recipe(
        &self,
        manufacturer_id: &str,
        input: CreateRecipeInput,
        today: NaiveDate,
    ) -> AppResult<Recipe> {
        let product = fetch_product(&self.db, input.product_id).await?;
        if product.manufacturer_id != manufacturer_id {
            return Err(AppError::Unauthorized(format!(
                "Product {} belongs to another manufacturer",
                product.id
            )));
        }

        let composition: Vec<(IngredientId, Decimal)> =
            input.lines.iter().map(|l| (l.ingredient_id, l.quantity)).collect();
        validate_composition(&composition).map_err(|msg| AppError::validation("lines", msg))?;

        let ids: Vec<i32> = composition.iter().map(|(id, _)| *id).collect();
        let known = sqlx::query_scalar::<_, i32>("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        if let Some(missing) = ids.iter().find(|id| !known.contains(id)) {
            return Err(AppError::NotFound(format!("Ingredient {}", missing)));
        }

        let creation_date = input.creation_date.unwrap_or(today);
        let mut tx = self.db.begin().await?;

        let recipe_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO recipes (product_id, manufacturer_id, creation_date) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(product.id)
        .bind(manufacturer_id)
        .bind(creation_date)
        .fetch_one(&mut *tx)
        .await?;

        for line in &input.lines {
            sqlx::query("INSERT INTO recipe_lines (recipe_id, ingredient_id, quantity) VALUES ($1, $2, $3)")
                .bind(recipe_id)
                .bind(line.ingredient_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(manufacturer = manufacturer_id, product = product.id, recipe = %recipe_id, "Recipe created");

        Ok(Recipe {
            id: recipe_id,
            product_id: product.id,
            manufacturer_id: manufacturer_id.to_string(),
            creation_date,
            lines: input.lines,
        })
    }

    /// All versions of a product's recipe, active one first
    pub async fn list_recipes(&self, product_id: ProductId) -> AppResult<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT id, product_id, manufacturer_id, creation_date FROM recipes WHERE product_id = $1 {}",
            RECIPE_ORDER
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        self.with_lines(rows).await
    }

    /// Latest by creation date, then insertion order
    pub async fn active_recipe(&self, product_id: ProductId) -> AppResult<Recipe> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT id, product_id, manufacturer_id, creation_date FROM recipes WHERE product_id = $1 {} LIMIT 1",
            RECIPE_ORDER
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        self.with_lines(rows)
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Recipe for product {}", product_id)))
    }

    pub async fn get_recipe(&self, recipe_id: Uuid) -> AppResult<Recipe> {
        let rows = sqlx::query_as::<_, RecipeRow>(
            "SELECT id, product_id, manufacturer_id, creation_date FROM recipes WHERE id = $1",
        )
        .bind(recipe_id)
        .fetch_all(&self.db)
        .await?;
        self.with_lines(rows)
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Recipe {}", recipe_id)))
    }
}
