//! Inbound receipt statistics
//!
//! Receipts are imported facts used only by the analytics report. They never
//! change stock levels or the ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use shared::{validate_quantity, BloodType, Catalog, InboundRecord};

use super::decode_blood_type;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct InboundService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct InboundRow {
    blood_type: String,
    preparation_id: i32,
    qty: i32,
    receive_date: NaiveDate,
}

/// One imported row. Blood type may carry an Rh suffix; preparation may be an alias.
#[derive(Debug, Deserialize)]
pub struct InboundRowInput {
    pub receive_date: NaiveDate,
    pub blood_type: String,
    pub preparation: String,
    pub qty: i32,
}

#[derive(Debug, Serialize)]
pub struct InboundImportResult {
    pub inserted: usize,
}

impl InboundService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Resolve raw rows against the catalog; the first bad row rejects the import
    pub fn normalize_rows(
        catalog: &Catalog,
        rows: &[InboundRowInput],
    ) -> AppResult<Vec<InboundRecord>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let blood_type = BloodType::normalize(&row.blood_type).ok_or_else(|| {
                    AppError::Validation {
                        field: format!("rows[{}].blood_type", i),
                        message: format!("Unknown blood type '{}'", row.blood_type),
                        message_ko: format!("알 수 없는 혈액형입니다: {}", row.blood_type),
                    }
                })?;

                let product = catalog.by_preparation(&row.preparation).ok_or_else(|| {
                    AppError::Validation {
                        field: format!("rows[{}].preparation", i),
                        message: format!("Unknown preparation '{}'", row.preparation),
                        message_ko: format!("알 수 없는 제제입니다: {}", row.preparation),
                    }
                })?;

                validate_quantity("qty", row.qty)?;

                Ok(InboundRecord {
                    blood_type,
                    preparation_id: product.id,
                    qty: row.qty,
                    receive_date: row.receive_date,
                })
            })
            .collect()
    }

    /// Insert all rows in one transaction
    pub async fn import(
        &self,
        catalog: &Catalog,
        rows: &[InboundRowInput],
    ) -> AppResult<InboundImportResult> {
        let records = Self::normalize_rows(catalog, rows)?;

        let mut tx = self.db.begin().await?;

        for record in &records {
            sqlx::query(
                r#"
                INSERT INTO inbound_history (receive_date, blood_type, preparation_id, qty)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(record.receive_date)
            .bind(record.blood_type.as_str())
            .bind(record.preparation_id)
            .bind(record.qty)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(rows = records.len(), "Inbound history imported");

        Ok(InboundImportResult {
            inserted: records.len(),
        })
    }

    /// Receipts with `start <= receive_date <= end`
    pub async fn list(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<InboundRecord>> {
        let rows = sqlx::query_as::<_, InboundRow>(
            r#"
            SELECT blood_type, preparation_id, qty, receive_date
            FROM inbound_history
            WHERE receive_date BETWEEN $1 AND $2
            ORDER BY receive_date, blood_type, preparation_id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(InboundRecord {
                    blood_type: decode_blood_type(&row.blood_type)?,
                    preparation_id: row.preparation_id,
                    qty: row.qty,
                    receive_date: row.receive_date,
                })
            })
            .collect()
    }
}
