//! Danger-stock event log

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::{stock_ratio, BloodType, Catalog, DangerAlertRecord, ValidationError};

use super::{decode_blood_type, ConfigService};
use crate::error::AppResult;

/// Default number of log rows returned
pub const DEFAULT_DANGER_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct DangerAlertService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct DangerRow {
    id: i64,
    alert_date: DateTime<Utc>,
    blood_type: String,
    rbc_qty: i32,
    danger_threshold: Option<Decimal>,
    actual_ratio: Option<Decimal>,
    reason: Option<String>,
    actor_id: Option<Uuid>,
}

impl DangerRow {
    fn into_record(self) -> AppResult<DangerAlertRecord> {
        Ok(DangerAlertRecord {
            id: self.id,
            alert_date: self.alert_date,
            blood_type: decode_blood_type(&self.blood_type)?,
            rbc_qty: self.rbc_qty,
            danger_threshold: self.danger_threshold,
            actual_ratio: self.actual_ratio,
            reason: self.reason,
            actor_id: self.actor_id,
        })
    }
}

const DANGER_COLUMNS: &str =
    "id, alert_date, blood_type, rbc_qty, danger_threshold, actual_ratio, reason, actor_id";

/// Input for recording a danger event
#[derive(Debug, Deserialize, Validate)]
pub struct RecordDangerAlertInput {
    pub blood_type: BloodType,
    #[validate(range(min = 0))]
    pub rbc_qty: i32,
    pub danger_threshold: Option<Decimal>,
    /// Computed from the red-cell consumption rate when absent
    pub actual_ratio: Option<Decimal>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

impl RecordDangerAlertInput {
    pub fn check_threshold(&self) -> Result<(), ValidationError> {
        match self.danger_threshold {
            Some(threshold) if threshold < Decimal::ZERO => {
                Err(ValidationError::Negative("danger_threshold"))
            }
            _ => Ok(()),
        }
    }
}

impl DangerAlertService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        catalog: &Catalog,
        config: &ConfigService,
        actor: Option<Uuid>,
        input: RecordDangerAlertInput,
    ) -> AppResult<DangerAlertRecord> {
        input.check_threshold()?;

        let actual_ratio = match input.actual_ratio {
            Some(ratio) => Some(ratio),
            None => {
                let snapshot = config.load_snapshot().await?;
                ConfigService::family_targets(&snapshot, catalog)
                    .get(&input.blood_type)
                    .and_then(|t| stock_ratio(input.rbc_qty, t.parameters.daily_consumption_rate))
            }
        };

        let reason = input
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let record = sqlx::query_as::<_, DangerRow>(&format!(
            "INSERT INTO danger_alert_log \
             (blood_type, rbc_qty, danger_threshold, actual_ratio, reason, actor_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            DANGER_COLUMNS
        ))
        .bind(input.blood_type.as_str())
        .bind(input.rbc_qty)
        .bind(input.danger_threshold)
        .bind(actual_ratio)
        .bind(reason)
        .bind(actor)
        .fetch_one(&self.db)
        .await?
        .into_record()?;

        tracing::warn!(
            blood_type = %record.blood_type,
            rbc_qty = record.rbc_qty,
            actual_ratio = ?record.actual_ratio,
            "Danger stock event recorded"
        );

        Ok(record)
    }

    /// Log rows, newest first
    pub async fn list(&self, limit: i64) -> AppResult<Vec<DangerAlertRecord>> {
        let rows = sqlx::query_as::<_, DangerRow>(&format!(
            "SELECT {} FROM danger_alert_log ORDER BY alert_date DESC, id DESC LIMIT $1",
            DANGER_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(DangerRow::into_record).collect()
    }
}
