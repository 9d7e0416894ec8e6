//! HTTP handlers for recall lookups

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{IngredientLotNumber, ProductLotNumber};

use crate::{
    error::AppResult,
    middleware::{ActorRole, CurrentActor},
    services::traceability::{BackwardTrace, ForwardTrace, TraceabilityService},
    AppState,
};

/// Ingredient lots consumed by a product lot
pub async fn trace_backward(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(lot_number): Path<String>,
) -> AppResult<Json<BackwardTrace>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let lot_number = ProductLotNumber::parse(&lot_number)?;
    let service = TraceabilityService::new(state.db);
    let trace = service.trace_backward(&lot_number).await?;
    Ok(Json(trace))
}

/// Product lots an ingredient lot went into
pub async fn trace_forward(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(lot_number): Path<String>,
) -> AppResult<Json<ForwardTrace>> {
    current_actor.0.require(ActorRole::Viewer)?;
    let lot_number = IngredientLotNumber::parse(&lot_number)?;
    let service = TraceabilityService::new(state.db);
    let trace = service.trace_forward(&lot_number).await?;
    Ok(Json(trace))
}
