//! HTTP handlers for production endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use shared::ProductLotNumber;

use crate::error::AppResult;
use crate::middleware::{ActorRole, CurrentActor};
use crate::services::production::{ProduceBatchInput, ProductBatchRecord, ProductionService};
use crate::AppState;

/// Produce a product batch, consuming ingredient lots
pub async fn produce_batch(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<ProduceBatchInput>,
) -> AppResult<Json<ProductBatchRecord>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = ProductionService::new(state.db, state.config.inventory.clone());
    let batch = service.produce_batch(manufacturer_id, input, Utc::now().date_naive()).await?;
    Ok(Json(batch))
}

pub async fn get_product_batch(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(lot_number): Path<String>,
) -> AppResult<Json<ProductBatchRecord>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let lot_number = ProductLotNumber::parse(&lot_number)?;
    let service = ProductionService::new(state.db, state.config.inventory.clone());
    let batch = service.get_batch(&lot_number).await?;
    Ok(Json(batch))
}
