//! HTTP handlers for formulation endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::Formulation;

use crate::error::AppResult;
use crate::middleware::{ActorRole, CurrentActor};
use crate::services::formulation::{CreateFormulationInput, FormulationService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActiveQuery {
    pub on: Option<NaiveDate>,
}

/// Create the next version of a compound's formulation
pub async fn create_formulation(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<CreateFormulationInput>,
) -> AppResult<Json<Formulation>> {
    let supplier_id = current_actor.0.require(ActorRole::Supplier)?;
    let service = FormulationService::new(state.db, state.config.inventory.clone());
    let formulation = service.create_formulation(supplier_id, input).await?;
    Ok(Json(formulation))
}

pub async fn list_formulations(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<Formulation>>> {
    let supplier_id = current_actor.0.require(ActorRole::Supplier)?;
    let service = FormulationService::new(state.db, state.config.inventory.clone());
    let formulations = service.list_formulations(supplier_id).await?;
    Ok(Json(formulations))
}

/// Formulations in effect on a date (default today)
pub async fn list_active_formulations(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Query(query): Query<ActiveQuery>,
) -> AppResult<Json<Vec<Formulation>>> {
    let supplier_id = current_actor.0.require(ActorRole::Supplier)?;
    let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
    let service = FormulationService::new(state.db, state.config.inventory.clone());
    let formulations = service.active_formulations(supplier_id, on).await?;
    Ok(Json(formulations))
}
