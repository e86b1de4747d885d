//! HTTP handlers for inbound receipt statistics

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use shared::{report_window, InboundRecord};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::analytics::AnalyticsService;
use crate::services::inbound::{InboundImportResult, InboundRowInput};
use crate::services::{CatalogService, InboundService};
use crate::AppState;

#[derive(Deserialize)]
pub struct InboundImportInput {
    pub rows: Vec<InboundRowInput>,
}

#[derive(Deserialize)]
pub struct InboundQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn import_inbound(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(input): Json<InboundImportInput>,
) -> AppResult<Json<InboundImportResult>> {
    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let result = InboundService::new(state.db).import(&catalog, &input.rows).await?;
    Ok(Json(result))
}

pub async fn list_inbound(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<InboundQuery>,
) -> AppResult<Json<Vec<InboundRecord>>> {
    let reporting = &state.config.reporting;
    let today = AnalyticsService::new(state.db.clone(), reporting.offset()).today();

    let window = report_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        today,
        reporting.default_window_days,
    )?;

    let records = InboundService::new(state.db).list(window.start, window.end).await?;
    Ok(Json(records))
}
