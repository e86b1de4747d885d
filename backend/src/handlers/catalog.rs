//! HTTP handlers for the product catalog and safety thresholds

use axum::{extract::State, Json};

use shared::{Product, SafetyThreshold};

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::catalog::UpdateThresholdInput;
use crate::services::CatalogService;
use crate::AppState;

pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    let catalog = CatalogService::new(state.db).load_catalog().await?;
    Ok(Json(catalog.products().to_vec()))
}

pub async fn list_thresholds(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<SafetyThreshold>>> {
    let thresholds = CatalogService::new(state.db).list_thresholds().await?;
    Ok(Json(thresholds))
}

/// Create or replace one threshold pair
pub async fn update_threshold(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateThresholdInput>,
) -> AppResult<Json<SafetyThreshold>> {
    require_permission(&current_user.0, "config", "write")?;

    let threshold = CatalogService::new(state.db).update_threshold(input).await?;
    Ok(Json(threshold))
}
