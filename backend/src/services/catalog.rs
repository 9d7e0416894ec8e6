//! Catalog service: parties, ingredients, categories, products and
//! do-not-combine rules

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    validate_display_name, validate_positive_quantity, Category, Ingredient, IngredientId,
    IngredientKind, IngredientPair, Product, ProductId,
};
use sqlx::{FromRow, PgExecutor, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::ActorRole;

/// Catalog service for reference data
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// A supplier or manufacturer as registered
#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub role: ActorRole,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterPartyInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeclareIngredientInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub kind: IngredientKind,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DefineProductInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub category_id: i32,
    pub standard_batch_size: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub standard_batch_size: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct DoNotCombineInput {
    pub first_ingredient_id: IngredientId,
    pub second_ingredient_id: IngredientId,
}

#[derive(Debug, FromRow)]
pub(crate) struct IngredientRow {
    pub id: i32,
    pub name: String,
    pub kind: String,
}

impl TryFrom<IngredientRow> for Ingredient {
    type Error = AppError;

    fn try_from(row: IngredientRow) -> Result<Self, Self::Error> {
        let kind = IngredientKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown ingredient kind '{}'", row.kind)))?;
        Ok(Ingredient {
            id: row.id,
            name: row.name,
            kind,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    category_id: i32,
    manufacturer_id: String,
    standard_batch_size: Decimal,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            manufacturer_id: row.manufacturer_id,
            standard_batch_size: row.standard_batch_size,
        }
    }
}

/// Make sure the acting party has a catalog row
///
/// Parties are identified by their token; the first write registers them
/// under their own code until they set a display name.
pub async fn ensure_party<'e, E: PgExecutor<'e>>(executor: E, role: ActorRole, code: &str) -> AppResult<()> {
    let sql = match role {
        ActorRole::Supplier => "INSERT INTO suppliers (id, name) VALUES ($1, $1) ON CONFLICT (id) DO NOTHING",
        ActorRole::Manufacturer => "INSERT INTO manufacturers (id, name) VALUES ($1, $1) ON CONFLICT (id) DO NOTHING",
        ActorRole::Viewer => return Ok(()),
    };
    sqlx::query(sql).bind(code).execute(executor).await?;
    Ok(())
}

pub async fn fetch_ingredient<'e, E: PgExecutor<'e>>(executor: E, id: IngredientId) -> AppResult<Ingredient> {
    sqlx::query_as::<_, IngredientRow>("SELECT id, name, kind FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ingredient {}", id)))?
        .try_into()
}

pub async fn fetch_product<'e, E: PgExecutor<'e>>(executor: E, id: ProductId) -> AppResult<Product> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, category_id, manufacturer_id, standard_batch_size FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {}", id)))?;
    Ok(row.into())
}

/// Every do-not-combine rule
pub async fn load_rules<'e, E: PgExecutor<'e>>(executor: E) -> AppResult<Vec<IngredientPair>> {
    let rows = sqlx::query_as::<_, (i32, i32)>("SELECT ingredient_a, ingredient_b FROM do_not_combine")
        .fetch_all(executor)
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(a, b)| IngredientPair::new(a, b))
        .collect())
}

fn check_name(field: &str, name: &str) -> AppResult<()> {
    validate_display_name(name).map_err(|msg| AppError::validation(field, msg))
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Set the display name of the acting supplier or manufacturer
    pub async fn register_party(&self, role: ActorRole, code: &str, input: RegisterPartyInput) -> AppResult<Party> {
        input.validate()?;
        check_name("name", &input.name)?;
        let sql = match role {
            ActorRole::Supplier => {
                "INSERT INTO suppliers (id, name) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
            }
            ActorRole::Manufacturer => {
                "INSERT INTO manufacturers (id, name) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name"
            }
            ActorRole::Viewer => {
                return Err(AppError::Unauthorized(
                    "Viewers are not catalog parties".to_string(),
                ))
            }
        };
        let name = input.name.trim().to_string();
        sqlx::query(sql).bind(code).bind(&name).execute(&self.db).await?;

        Ok(Party {
            id: code.to_string(),
            name,
            role,
        })
    }

    /// Declare an ingredient as supplied by `supplier_id`
    ///
    /// An existing name is reused when the kind matches; the supplier is
    /// associated with it either way.
    pub async fn declare_ingredient(&self, supplier_id: &str, input: DeclareIngredientInput) -> AppResult<Ingredient> {
        input.validate()?;
        check_name("name", &input.name)?;
        let name = input.name.trim();

        let mut tx = self.db.begin().await?;
        ensure_party(&mut *tx, ActorRole::Supplier, supplier_id).await?;

        sqlx::query("INSERT INTO ingredients (name, kind) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .bind(input.kind.as_str())
            .execute(&mut *tx)
            .await?;

        let ingredient: Ingredient =
            sqlx::query_as::<_, IngredientRow>("SELECT id, name, kind FROM ingredients WHERE name = $1")
                .bind(name)
                .fetch_one(&mut *tx)
                .await?
                .try_into()?;

        if ingredient.kind != input.kind {
            return Err(AppError::InvalidState(format!(
                "Ingredient '{}' already exists as {}",
                ingredient.name, ingredient.kind
            )));
        }

        sqlx::query(
            "INSERT INTO supplier_ingredients (supplier_id, ingredient_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(supplier_id)
        .bind(ingredient.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(supplier = supplier_id, ingredient = ingredient.id, "Ingredient declared");
        Ok(ingredient)
    }

    pub async fn list_ingredients(&self) -> AppResult<Vec<Ingredient>> {
        sqlx::query_as::<_, IngredientRow>("SELECT id, name, kind FROM ingredients ORDER BY id")
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(Ingredient::try_from)
            .collect()
    }

    /// Ingredients the supplier has declared
    pub async fn list_supplier_ingredients(&self, supplier_id: &str) -> AppResult<Vec<Ingredient>> {
        sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT i.id, i.name, i.kind
            FROM ingredients i
            JOIN supplier_ingredients si ON si.ingredient_id = i.id
            WHERE si.supplier_id = $1
            ORDER BY i.id
            "#,
        )
        .bind(supplier_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(Ingredient::try_from)
        .collect()
    }

    pub async fn create_category(&self, input: CreateCategoryInput) -> AppResult<Category> {
        input.validate()?;
        check_name("name", &input.name)?;
        let row = sqlx::query_as::<_, (i32, String)>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
        )
        .bind(input.name.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            e if super::db::is_unique_violation(&e) => AppError::DuplicateEntry("category name".to_string()),
            e => e.into(),
        })?;
        Ok(Category { id: row.0, name: row.1 })
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, (i32, String)>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Category { id, name })
            .collect())
    }

    async fn check_category(&self, category_id: i32) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {}", category_id)))?;
        Ok(())
    }

    pub async fn define_product(&self, manufacturer_id: &str, input: DefineProductInput) -> AppResult<Product> {
        input.validate()?;
        check_name("name", &input.name)?;
        validate_positive_quantity(input.standard_batch_size)
            .map_err(|msg| AppError::validation("standard_batch_size", msg))?;
        self.check_category(input.category_id).await?;

        let mut tx = self.db.begin().await?;
        ensure_party(&mut *tx, ActorRole::Manufacturer, manufacturer_id).await?;

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (name, category_id, manufacturer_id, standard_batch_size)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, category_id, manufacturer_id, standard_batch_size
            "#,
        )
        .bind(input.name.trim())
        .bind(input.category_id)
        .bind(manufacturer_id)
        .bind(input.standard_batch_size)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(manufacturer = manufacturer_id, product = row.id, "Product defined");
        Ok(row.into())
    }

    /// Update name, category or standard batch size of an owned product
    pub async fn update_product(
        &self,
        manufacturer_id: &str,
        product_id: ProductId,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        input.validate()?;
        let existing = fetch_product(&self.db, product_id).await?;
        if existing.manufacturer_id != manufacturer_id {
            return Err(AppError::Unauthorized(format!(
                "Product {} belongs to another manufacturer",
                product_id
            )));
        }

        if let Some(name) = &input.name {
            check_name("name", name)?;
        }
        if let Some(size) = input.standard_batch_size {
            validate_positive_quantity(size).map_err(|msg| AppError::validation("standard_batch_size", msg))?;
        }
        if let Some(category_id) = input.category_id {
            self.check_category(category_id).await?;
        }

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                category_id = COALESCE($3, category_id),
                standard_batch_size = COALESCE($4, standard_batch_size),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, category_id, manufacturer_id, standard_batch_size
            "#,
        )
        .bind(product_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.category_id)
        .bind(input.standard_batch_size)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    pub async fn get_product(&self, product_id: ProductId) -> AppResult<Product> {
        fetch_product(&self.db, product_id).await
    }

    /// Declare two atomic ingredients unsafe to combine
    pub async fn declare_do_not_combine(&self, input: DoNotCombineInput) -> AppResult<IngredientPair> {
        let pair = IngredientPair::new(input.first_ingredient_id, input.second_ingredient_id)
            .ok_or_else(|| AppError::validation("second_ingredient_id", "An ingredient cannot conflict with itself"))?;

        for id in [pair.first(), pair.second()] {
            let ingredient = fetch_ingredient(&self.db, id).await?;
            if ingredient.kind != IngredientKind::Atomic {
                return Err(AppError::InvalidState(format!(
                    "Do-not-combine rules apply to atomic ingredients, {} is compound",
                    ingredient.name
                )));
            }
        }

        sqlx::query("INSERT INTO do_not_combine (ingredient_a, ingredient_b) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(pair.first())
            .bind(pair.second())
            .execute(&self.db)
            .await?;

        tracing::info!(pair = %pair, "Do-not-combine rule declared");
        Ok(pair)
    }

    pub async fn list_do_not_combine(&self) -> AppResult<Vec<IngredientPair>> {
        let mut rules = load_rules(&self.db).await?;
        rules.sort();
        Ok(rules)
    }
}
