//! Analytics report handler with CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use shared::report_window;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::analytics::AnalyticsOutcome;
use crate::services::{AnalyticsService, CatalogService, ConfigService, InventoryService};
use crate::AppState;

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

/// Reconstructed stock history for a date window
pub async fn get_analytics(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Response> {
    let reporting = &state.config.reporting;
    let service = AnalyticsService::new(state.db.clone(), reporting.offset());

    let window = report_window(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        service.today(),
        reporting.default_window_days,
    )?;

    let catalog = CatalogService::new(state.db.clone()).load_catalog().await?;
    let config = ConfigService::new(state.db.clone(), reporting.parameter_set.clone());
    let inventory = InventoryService::new(state.db.clone(), state.notifier.clone());

    let outcome = service.report(&catalog, &config, &inventory, window).await?;

    match (outcome, query.format.as_deref()) {
        (AnalyticsOutcome::Report(report), Some("csv")) => {
            let csv = AnalyticsService::export_to_csv(&report.family_rows())?;
            let disposition = format!(
                "attachment; filename=\"stock_history_{}_{}.csv\"",
                window.start, window.end
            );
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                csv,
            )
                .into_response())
        }
        (outcome, _) => Ok(Json(outcome).into_response()),
    }
}
