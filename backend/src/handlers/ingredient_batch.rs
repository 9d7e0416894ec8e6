//! HTTP handlers for ingredient batch endpoints

use axum::{extract::State, Json};
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::{ActorRole, CurrentActor};
use crate::services::ingredient_batch::{CreateIngredientBatchInput, IngredientBatchRecord, IngredientBatchService};
use crate::AppState;

/// Create a lot of an ingredient the caller supplies
pub async fn create_ingredient_batch(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<CreateIngredientBatchInput>,
) -> AppResult<Json<IngredientBatchRecord>> {
    let supplier_id = current_actor.0.require(ActorRole::Supplier)?;
    let service = IngredientBatchService::new(state.db, state.config.inventory.clone());
    let batch = service
        .create_batch(supplier_id, input, Utc::now().date_naive())
        .await?;
    Ok(Json(batch))
}

pub async fn list_ingredient_batches(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<IngredientBatchRecord>>> {
    let supplier_id = current_actor.0.require(ActorRole::Supplier)?;
    let service = IngredientBatchService::new(state.db, state.config.inventory.clone());
    let batches = service.list_batches(supplier_id).await?;
    Ok(Json(batches))
}
