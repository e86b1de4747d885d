//! HTTP handlers for consumption-rate / safety-factor configuration

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use shared::{BloodType, ConfigChangeRecord, ConfigOverride};

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::config::{
    ResolvedParameters, SplitRatioSetting, UpdateParametersInput, UpdateParametersResult,
    UpdateSplitRatioInput,
};
use crate::services::{CatalogService, ConfigService};
use crate::AppState;

/// Default number of history rows returned
const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub blood_type: BloodType,
    pub preparation_id: i32,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

fn config_service(state: &AppState) -> ConfigService {
    ConfigService::new(state.db.clone(), state.config.reporting.parameter_set.clone())
}

pub async fn list_overrides(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<ConfigOverride>>> {
    let overrides = config_service(&state).list_overrides().await?;
    Ok(Json(overrides))
}

/// Change rate/factor for one scope, recording every modified value
pub async fn update_parameters(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateParametersInput>,
) -> AppResult<Json<UpdateParametersResult>> {
    require_permission(&current_user.0, "config", "write")?;

    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let result = config_service(&state)
        .update_parameters(&catalog, input, Some(current_user.0.user_id))
        .await?;
    Ok(Json(result))
}

/// Effective parameters and the tier that produced them
pub async fn resolve_parameters(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ResolveQuery>,
) -> AppResult<Json<ResolvedParameters>> {
    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let resolved = config_service(&state)
        .resolve_for(&catalog, query.blood_type, query.preparation_id)
        .await?;
    Ok(Json(resolved))
}

pub async fn list_config_history(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ConfigChangeRecord>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 1000);
    let history = config_service(&state).history(limit).await?;
    Ok(Json(history))
}

pub async fn get_split_ratio(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<SplitRatioSetting>> {
    let setting = config_service(&state).get_split_ratio().await?;
    Ok(Json(setting))
}

pub async fn update_split_ratio(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateSplitRatioInput>,
) -> AppResult<Json<SplitRatioSetting>> {
    require_permission(&current_user.0, "config", "write")?;

    let setting = config_service(&state)
        .set_split_ratio(input, Some(current_user.0.user_id))
        .await?;
    Ok(Json(setting))
}
