//! HTTP handlers for manufacturer inventory endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use shared::{IngredientLotNumber, OnHand};

use crate::error::AppResult;
use crate::middleware::{ActorRole, CurrentActor};
use crate::services::inventory::{InventoryRecord, InventoryService, NearlyOutOfStock, ReceiveIngredientInput};
use crate::AppState;

/// Receive part of an ingredient lot into the caller's inventory
pub async fn receive_ingredient(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Json(input): Json<ReceiveIngredientInput>,
) -> AppResult<Json<InventoryRecord>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = InventoryService::new(state.db, state.config.inventory.clone());
    let record = service
        .receive(manufacturer_id, input, Utc::now().date_naive())
        .await?;
    Ok(Json(record))
}

pub async fn get_on_hand(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<OnHand>>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = InventoryService::new(state.db, state.config.inventory.clone());
    let stock = service.on_hand(manufacturer_id).await?;
    Ok(Json(stock))
}

pub async fn get_almost_expiring(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<OnHand>>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = InventoryService::new(state.db, state.config.inventory.clone());
    let stock = service
        .almost_expiring(manufacturer_id, Utc::now().date_naive())
        .await?;
    Ok(Json(stock))
}

pub async fn get_nearly_out_of_stock(
    State(state): State<AppState>,
    current_actor: CurrentActor,
) -> AppResult<Json<Vec<NearlyOutOfStock>>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let service = InventoryService::new(state.db, state.config.inventory.clone());
    let products = service.nearly_out_of_stock(manufacturer_id).await?;
    Ok(Json(products))
}

/// Receipt rows the caller holds for one ingredient lot
pub async fn get_lot_receipts(
    State(state): State<AppState>,
    current_actor: CurrentActor,
    Path(lot_number): Path<String>,
) -> AppResult<Json<Vec<InventoryRecord>>> {
    let manufacturer_id = current_actor.0.require(ActorRole::Manufacturer)?;
    let lot_number = IngredientLotNumber::parse(&lot_number)?;
    let service = InventoryService::new(state.db, state.config.inventory.clone());
    let receipts = service.receipts_for_lot(manufacturer_id, &lot_number).await?;
    Ok(Json(receipts))
}
