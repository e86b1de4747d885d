//! Product catalog and safety threshold service

use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

use shared::{validate_threshold, BloodType, Catalog, Component, Product, SafetyThreshold, StockKey};

use super::decode_blood_type;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i32,
    component: String,
    preparation: String,
    remark: Option<String>,
}

impl ProductRow {
    fn into_product(self) -> AppResult<Product> {
        let component: Component = self
            .component
            .parse()
            .map_err(|e: String| AppError::Internal(format!("Corrupt product row: {}", e)))?;

        Ok(Product {
            id: self.id,
            component,
            preparation: self.preparation,
            remark: self.remark,
        })
    }
}

#[derive(Debug, FromRow)]
struct ThresholdRow {
    blood_type: String,
    preparation_id: i32,
    safety_qty: i32,
    alert_threshold: i32,
}

impl ThresholdRow {
    fn into_threshold(self) -> AppResult<SafetyThreshold> {
        Ok(SafetyThreshold {
            blood_type: decode_blood_type(&self.blood_type)?,
            preparation_id: self.preparation_id,
            safety_qty: self.safety_qty,
            alert_threshold: self.alert_threshold,
        })
    }
}

/// Input for updating one threshold pair
#[derive(Debug, Deserialize)]
pub struct UpdateThresholdInput {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    pub safety_qty: i32,
    pub alert_threshold: i32,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Load the full product catalog
    pub async fn load_catalog(&self) -> AppResult<Catalog> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, component, preparation, remark FROM products ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;

        let products = rows
            .into_iter()
            .map(ProductRow::into_product)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Catalog::new(products))
    }

    pub async fn list_thresholds(&self) -> AppResult<Vec<SafetyThreshold>> {
        let rows = sqlx::query_as::<_, ThresholdRow>(
            r#"
            SELECT blood_type, preparation_id, safety_qty, alert_threshold
            FROM safety_thresholds
            ORDER BY preparation_id, blood_type
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ThresholdRow::into_threshold).collect()
    }

    /// Thresholds keyed by stock key
    pub async fn threshold_map(&self) -> AppResult<HashMap<StockKey, SafetyThreshold>> {
        Ok(self
            .list_thresholds()
            .await?
            .into_iter()
            .map(|t| (t.key(), t))
            .collect())
    }

    /// Create or replace a threshold pair
    pub async fn update_threshold(&self, input: UpdateThresholdInput) -> AppResult<SafetyThreshold> {
        validate_threshold(input.safety_qty, input.alert_threshold)?;

        let catalog = self.load_catalog().await?;
        if catalog.get(input.preparation_id).is_none() {
            return Err(AppError::NotFound(format!(
                "Preparation {}",
                input.preparation_id
            )));
        }

        let row = sqlx::query_as::<_, ThresholdRow>(
            r#"
            INSERT INTO safety_thresholds (blood_type, preparation_id, safety_qty, alert_threshold)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (blood_type, preparation_id)
            DO UPDATE SET safety_qty = EXCLUDED.safety_qty,
                          alert_threshold = EXCLUDED.alert_threshold
            RETURNING blood_type, preparation_id, safety_qty, alert_threshold
            "#,
        )
        .bind(input.blood_type.as_str())
        .bind(input.preparation_id)
        .bind(input.safety_qty)
        .bind(input.alert_threshold)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(
            blood_type = %input.blood_type,
            preparation_id = input.preparation_id,
            safety_qty = input.safety_qty,
            alert_threshold = input.alert_threshold,
            "Safety threshold updated"
        );

        row.into_threshold()
    }
}
