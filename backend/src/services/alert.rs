//! Post-mutation alert evaluation

use sqlx::PgPool;
use std::collections::HashMap;

use shared::{evaluate_touched, AlertPayload, Catalog, StockKey};

use super::{decode_blood_type, CatalogService};
use crate::error::AppResult;

#[derive(Clone)]
pub struct AlertService {
    db: PgPool,
}

impl AlertService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Evaluate alerts for the touched rows against committed stock
    pub async fn evaluate(
        &self,
        catalog: &Catalog,
        touched: &[StockKey],
    ) -> AppResult<Vec<AlertPayload>> {
        if touched.is_empty() {
            return Ok(Vec::new());
        }

        let mut blood_types: Vec<&str> = touched.iter().map(|k| k.blood_type.as_str()).collect();
        blood_types.sort_unstable();
        blood_types.dedup();

        let rows = sqlx::query_as::<_, (String, i32, i32)>(
            r#"
            SELECT blood_type, preparation_id, current_qty
            FROM stock_levels
            WHERE blood_type = ANY($1)
            "#,
        )
        .bind(&blood_types)
        .fetch_all(&self.db)
        .await?;

        let mut stock = HashMap::with_capacity(rows.len());
        for (blood_type, preparation_id, qty) in rows {
            stock.insert(StockKey::new(decode_blood_type(&blood_type)?, preparation_id), qty);
        }

        let thresholds = CatalogService::new(self.db.clone()).threshold_map().await?;

        Ok(evaluate_touched(catalog, touched, &stock, &thresholds))
    }
}
