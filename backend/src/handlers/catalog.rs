//! HTTP handlers for catalog endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{Category, Ingredient, IngredientPair, Product, ProductId};

use crate::error::AppResult;
use crate::middleware::{ActorRole, CurrentActor};
use crate::services::catalog::{
    CatalogService, CreateCategoryInput, DeclareIngredientInput, DefineProductInput, DoNotCombineInput, Party,
    RegisterPartyInput, UpdateProductInput,
};
use crate::AppState;

/// Set the display name of the calling supplier or manufacturer
pub async fn register_party(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<RegisterPartyInput>,
) -> AppResult<Json<Party>> {
    let actor = current_actor.0;
    let service = CatalogService::new(state.db);
    let party = service.register_party(actor.role, &actor.code, input).await?;
    Ok(Json(party))
}

/// Declare an ingredient supplied by the caller
pub async fn declare_ingredient(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<DeclareIngredientInput>,
) -> AppResult<Json<Ingredient>> {
    let supplier_id = current_actor.0.require(ActorRole::Supplier)?;
    let service = CatalogService::new(state.db);
    let ingredient = service.declare_ingredient(supplier_id, input).await?;
    Ok(Json(ingredient))
}

/// List ingredients; suppliers see the ones they declared
pub async fn list_ingredients(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<Ingredient>>> {
    let actor = current_actor.0;
    let service = CatalogService::new(state.db);
    let ingredients = match actor.role {
        ActorRole::Supplier => service.list_supplier_ingredients(&actor.code).await?,
        _ => service.list_ingredients().await?,
    };
    Ok(Json(ingredients))
}

pub async fn create_category(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<Json<Category>> {
    current_actor.0.require(ActorRole::Manufacturer)?;
    let service = CatalogService::new(state.db);
    let category = service.create_category(input).await?;
    Ok(Json(category))
}

pub async fn list_categories(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<Category>>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = CatalogService::new(state.db);
    let categories = service.list_categories().await?;
    Ok(Json(categories))
}

/// Define a product owned by the calling manufacturer
pub async fn define_product(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<DefineProductInput>,
) -> AppResult<Json<Product>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = CatalogService::new(state.db);
    let product = service.define_product(manufacturer_id, input).await?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(product_id): Path<ProductId>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = CatalogService::new(state.db);
    let product = service.update_product(manufacturer_id, product_id, input).await?;
    Ok(Json(product))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(product_id): Path<ProductId>,
) -> AppResult<Json<Product>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = CatalogService::new(state.db);
    let product = service.get_product(product_id).await?;
    Ok(Json(product))
}

/// Declare two atomic ingredients unsafe to combine
pub async fn declare_do_not_combine(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<DoNotCombineInput>,
) -> AppResult<Json<IngredientPair>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = CatalogService::new(state.db);
    let pair = service.declare_do_not_combine(input).await?;
    Ok(Json(pair))
}

pub async fn list_do_not_combine(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<IngredientPair>>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = CatalogService::new(state.db);
    let rules = service.list_do_not_combine().await?;
    Ok(Json(rules))
}
