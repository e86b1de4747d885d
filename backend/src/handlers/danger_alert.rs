//! HTTP handlers for the danger-stock event log

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use shared::DangerAlertRecord;

use super::validate_input;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::danger_alert::{RecordDangerAlertInput, DEFAULT_DANGER_LIMIT};
use crate::services::{CatalogService, ConfigService, DangerAlertService};
use crate::AppState;

#[derive(Deserialize)]
pub struct DangerAlertQuery {
    pub limit: Option<i64>,
}

pub async fn list_danger_alerts(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<DangerAlertQuery>,
) -> AppResult<Json<Vec<DangerAlertRecord>>> {
    let limit = query.limit.unwrap_or(DEFAULT_DANGER_LIMIT).clamp(1, 1000);
    let records = DangerAlertService::new(state.db).list(limit).await?;
    Ok(Json(records))
}

/// Record a danger event with the reason given by staff
pub async fn record_danger_alert(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordDangerAlertInput>,
) -> AppResult<(StatusCode, Json<DangerAlertRecord>)> {
    validate_input(&input)?;
    input.check_threshold()?;

    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let config = ConfigService::new(state.db.clone(), state.config.reporting.parameter_set.clone());
    let record = DangerAlertService::new(state.db)
        .record(&catalog, &config, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
