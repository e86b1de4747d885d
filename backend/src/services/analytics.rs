//! Historical analytics report
//!
//! Loads the current stock, the ledger since the window start and inbound
//! receipts, then hands everything to the pure reconstructor.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;

use shared::{
    build_report, AnalyticsReport, Catalog, DateRange, DatedMovement, ReconstructError,
    ReportInput, StockKey,
};

use super::{decode_blood_type, ConfigService, InboundService, InventoryService};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct AnalyticsService {
    db: PgPool,
    offset: FixedOffset,
}

/// Either a report or the marker for a window with no stock data
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyticsOutcome {
    Report(Box<AnalyticsReport>),
    Empty(EmptyReport),
}

#[derive(Debug, Serialize)]
pub struct EmptyReport {
    pub status: &'static str,
    pub message: String,
}

impl AnalyticsService {
    pub fn new(db: PgPool, offset: FixedOffset) -> Self {
        Self { db, offset }
    }

    /// Calendar date "now" in the configured offset
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// Calendar date of a ledger timestamp in the configured offset
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant at which `date` begins locally
    fn start_of_day(&self, date: NaiveDate) -> AppResult<DateTime<Utc>> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::Internal(format!("Invalid date {}", date)))?;

        self.offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| AppError::Internal(format!("Ambiguous local midnight for {}", date)))
    }

    /// Ledger movements logged on or after `since`, dated in the configured offset
    async fn movements_since(&self, since: NaiveDate) -> AppResult<Vec<DatedMovement>> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, String, i32, i32, i32)>(
            r#"
            SELECT logged_at, blood_type, preparation_id, in_qty, out_qty
            FROM ledger_entries
            WHERE logged_at >= $1
            ORDER BY logged_at, seq
            "#,
        )
        .bind(self.start_of_day(since)?)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(logged_at, blood_type, preparation_id, in_qty, out_qty)| {
                Ok(DatedMovement {
                    date: self.local_date(logged_at),
                    key: StockKey::new(decode_blood_type(&blood_type)?, preparation_id),
                    in_qty,
                    out_qty,
                })
            })
            .collect()
    }

    pub async fn report(
        &self,
        catalog: &Catalog,
        config: &ConfigService,
        inventory: &InventoryService,
        window: DateRange,
    ) -> AppResult<AnalyticsOutcome> {
        let today = self.today();

        let current = inventory.current_quantities().await?;
        let movements = self.movements_since(window.start).await?;
        let inbound = InboundService::new(self.db.clone())
            .list(window.start, window.end)
            .await?;
        let snapshot = config.load_snapshot().await?;
        let family_targets = ConfigService::family_targets(&snapshot, catalog);

        let input = ReportInput {
            today,
            start: window.start,
            end: window.end,
            catalog,
            current: &current,
            movements: &movements,
            inbound: &inbound,
            family_targets: &family_targets,
        };

        match build_report(&input) {
            Ok(report) => {
                for drift in &report.diagnostics.drift {
                    tracing::warn!(
                        date = %drift.date,
                        blood_type = %drift.key.blood_type,
                        preparation_id = drift.key.preparation_id,
                        computed_qty = drift.computed_qty,
                        "Reconstructed stock went negative and was clamped to zero"
                    );
                }
                if !report.diagnostics.orphaned_keys.is_empty() {
                    tracing::warn!(
                        keys = ?report.diagnostics.orphaned_keys,
                        "Ledger entries without a current stock row were skipped"
                    );
                }
                tracing::info!(
                    start = %window.start,
                    end = %window.end,
                    days = report.charts.values().next().map(|c| c.dates.len()).unwrap_or(0),
                    alerts = report.alerts.len(),
                    "Analytics report built"
                );
                Ok(AnalyticsOutcome::Report(Box::new(report)))
            }
            Err(e @ ReconstructError::EmptyWindow { .. }) => {
                tracing::info!(start = %window.start, end = %window.end, "Analytics window is empty");
                Ok(AnalyticsOutcome::Empty(EmptyReport {
                    status: "empty",
                    message: e.to_string(),
                }))
            }
        }
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
