//! HTTP handlers for stock status, movements and reconciliation

use axum::{
    extract::{Query, State},
    Json,
};

use shared::LedgerEntry;

use super::validate_input;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{
    BulkSaveInput, BulkSaveResult, InventoryStatus, LedgerQuery, UpdateStockInput,
    UpdateStockResult,
};
use crate::services::{CatalogService, ConfigService, InventoryService};
use crate::AppState;

fn inventory_service(state: &AppState) -> InventoryService {
    InventoryService::new(state.db.clone(), state.notifier.clone())
}

/// Current stock with targets and alerts
pub async fn get_inventory_status(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<InventoryStatus>> {
    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let config = ConfigService::new(state.db.clone(), state.config.reporting.parameter_set.clone());
    let status = inventory_service(&state).status(&catalog, &config).await?;
    Ok(Json(status))
}

/// Apply a single in/out movement
pub async fn update_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateStockInput>,
) -> AppResult<Json<UpdateStockResult>> {
    validate_input(&input)?;

    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let result = inventory_service(&state)
        .apply_change(&catalog, Some(current_user.0.user_id), input)
        .await?;
    Ok(Json(result))
}

/// Reconcile stock to counted quantities
pub async fn bulk_save(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkSaveInput>,
) -> AppResult<Json<BulkSaveResult>> {
    validate_input(&input)?;

    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let result = inventory_service(&state)
        .bulk_save(&catalog, Some(current_user.0.user_id), input)
        .await?;
    Ok(Json(result))
}

/// Ledger entries, newest first
pub async fn list_ledger(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<Vec<LedgerEntry>>> {
    validate_input(&query)?;

    let entries = inventory_service(&state).list_ledger(&query).await?;
    Ok(Json(entries))
}
