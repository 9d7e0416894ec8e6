//! HTTP handlers for reporting endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{ProductId, ProductLotNumber};

use crate::error::AppResult;
use crate::middleware::{ActorRole, CurrentActor};
use crate::services::reporting::{
    CompareQuery, ExcludedIngredient, HealthRiskEntry, LastBatchIngredients, ListingFilter, ManufacturerSummary,
    ProductComparison, ProductIngredientListing, ReportingService, SupplierSpend, UnitCost,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OnDateQuery {
    pub on: Option<NaiveDate>,
}

/// Spend per supplier on lots the caller consumed
pub async fn get_supplier_spend(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<SupplierSpend>>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = ReportingService::new(state.db);
    let spend = service.supplier_spend(manufacturer_id).await?;
    Ok(Json(spend))
}

pub async fn get_unit_cost(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(lot_number): Path<String>,
) -> AppResult<Json<UnitCost>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let lot_number = ProductLotNumber::parse(&lot_number)?;
    let service = ReportingService::new(state.db);
    let cost = service.unit_cost(manufacturer_id, &lot_number).await?;
    Ok(Json(cost))
}

/// Ingredient list of a product's active recipe
pub async fn get_product_ingredients(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(product_id): Path<ProductId>,
    Query(query): Query<OnDateQuery>,
) -> AppResult<Json<ProductIngredientListing>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let service = ReportingService::new(state.db);
    let listing = service.product_ingredients(product_id, on).await?;
    Ok(Json(listing))
}

pub async fn get_ingredient_listing(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Query(filter): Query<ListingFilter>,
) -> AppResult<Json<Vec<ProductIngredientListing>>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = ReportingService::new(state.db);
    let listing = service
        .ingredient_listing(filter, Utc::now().date_naive())
        .await?;
    Ok(Json(listing))
}

/// Whether two products could be made together
pub async fn compare_products(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Query(query): Query<CompareQuery>,
) -> AppResult<Json<ProductComparison>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = ReportingService::new(state.db);
    let comparison = service.compare(query, Utc::now().date_naive()).await?;
    Ok(Json(comparison))
}

pub async fn get_manufacturers_not_supplied_by(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(supplier_id): Path<String>,
) -> AppResult<Json<Vec<ManufacturerSummary>>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = ReportingService::new(state.db);
    let manufacturers = service.manufacturers_not_supplied_by(&supplier_id).await?;
    Ok(Json(manufacturers))
}

pub async fn get_last_batch_ingredients(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(product_id): Path<ProductId>,
) -> AppResult<Json<LastBatchIngredients>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = ReportingService::new(state.db);
    let report = service.last_batch_ingredients(product_id).await?;
    Ok(Json(report))
}

/// Ingredients banned alongside what a product lot already holds
pub async fn get_excluded_ingredients(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(lot_number): Path<String>,
) -> AppResult<Json<Vec<ExcludedIngredient>>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let lot_number = ProductLotNumber::parse(&lot_number)?;
    let service = ReportingService::new(state.db);
    let excluded = service.excluded_ingredients(&lot_number).await?;
    Ok(Json(excluded))
}

pub async fn get_health_risks(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<HealthRiskEntry>>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let service = ReportingService::new(state.db);
    let entries = service.health_risks().await?;
    Ok(Json(entries))
}
