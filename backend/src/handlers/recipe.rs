//! HTTP handlers for recipe endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use shared::{ProductId, Recipe};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{ActorRole, CurrentActor};
use crate::services::recipe::{CreateRecipeInput, RecipeService};
use crate::AppState;

/// Record a new recipe for one of the caller's products
pub async fn create_recipe(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<CreateRecipeInput>,
) -> AppResult<Json<Recipe>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = RecipeService::new(state.db);
    let recipe = service
        .create_recipe(manufacturer_id, input, Utc::now().date_naive())
        .await?;
    Ok(Json(recipe))
}

pub async fn list_product_recipes(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(product_id): Path<ProductId>,
) -> AppResult<Json<Vec<Recipe>>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = RecipeService::new(state.db);
    let recipes = service.list_recipes(product_id).await?;
    Ok(Json(recipes))
}

/// The most recent recipe of a product
pub async fn get_active_recipe(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(product_id): Path<ProductId>,
) -> AppResult<Json<Recipe>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = RecipeService::new(state.db);
    let recipe = service.active_recipe(product_id).await?;
    Ok(Json(recipe))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<Recipe>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = RecipeService::new(state.db);
    let recipe = service.get_recipe(recipe_id).await?;
    Ok(Json(recipe))
}
