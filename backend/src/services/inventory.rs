//! Inventory ledger service
//!
//! Two mutation paths share the stock table:
//! - single-item movements (delta based, never clamps, row locked for update)
//! - bulk reconciliation (absolute quantities, each item planned against the
//!   writes that succeeded so far, written inside its own savepoint and
//!   committed once)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

use shared::{
    apply_movement, default_bulk_note, evaluate_touched, is_alert, request_qty, target_for,
    validate_note, AlertPayload, BloodType, BulkItem, BulkItemError, BulkItemResult, BulkPlan,
    BulkPlanner, BulkSummary, Catalog, Component, FamilyTarget, LedgerEntry, LedgerError,
    PairSlot, StockKey, StockLevel,
};

use super::{decode_blood_type, AlertService, CatalogService, ConfigService, NotificationService};
use crate::error::{AppError, AppResult};

/// Default number of ledger rows returned
pub const DEFAULT_LEDGER_LIMIT: i64 = 100;

/// Upper bound on ledger rows returned
pub const MAX_LEDGER_LIMIT: i64 = 1000;

#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    notifier: NotificationService,
}

#[derive(Debug, FromRow)]
struct StockRow {
    id: Uuid,
    blood_type: String,
    preparation_id: i32,
    current_qty: i32,
    note: Option<String>,
    updated_at: DateTime<Utc>,
}

impl StockRow {
    fn into_stock_level(self) -> AppResult<StockLevel> {
        Ok(StockLevel {
            id: self.id,
            blood_type: decode_blood_type(&self.blood_type)?,
            preparation_id: self.preparation_id,
            current_qty: self.current_qty,
            note: self.note,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    id: Uuid,
    logged_at: DateTime<Utc>,
    seq: i64,
    blood_type: String,
    preparation_id: i32,
    in_qty: i32,
    out_qty: i32,
    note: String,
    actor_id: Option<Uuid>,
    expiry_ok: bool,
    visual_ok: bool,
}

impl LedgerRow {
    fn into_entry(self) -> AppResult<LedgerEntry> {
        Ok(LedgerEntry {
            id: self.id,
            logged_at: self.logged_at,
            seq: self.seq,
            blood_type: decode_blood_type(&self.blood_type)?,
            preparation_id: self.preparation_id,
            in_qty: self.in_qty,
            out_qty: self.out_qty,
            note: self.note,
            actor_id: self.actor_id,
            expiry_ok: self.expiry_ok,
            visual_ok: self.visual_ok,
        })
    }
}

const STOCK_COLUMNS: &str = "id, blood_type, preparation_id, current_qty, note, updated_at";
const LEDGER_COLUMNS: &str = "id, logged_at, seq, blood_type, preparation_id, in_qty, out_qty, note, \
     actor_id, expiry_ok, visual_ok";

fn default_true() -> bool {
    true
}

/// Input for a single-item movement
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStockInput {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub in_qty: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub out_qty: i32,
    #[validate(length(min = 1, max = 500))]
    pub note: String,
    #[serde(default = "default_true")]
    pub expiry_ok: bool,
    #[serde(default = "default_true")]
    pub visual_ok: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateStockResult {
    pub previous_qty: i32,
    pub stock: StockLevel,
    pub entry: LedgerEntry,
    pub alerts: Vec<AlertPayload>,
}

/// Input for a bulk reconciliation
#[derive(Debug, Deserialize, Validate)]
pub struct BulkSaveInput {
    #[validate(length(min = 1))]
    pub items: Vec<BulkItem>,
    /// Applied to every movement; a per-item default is used when absent
    pub note: Option<String>,
    #[serde(default = "default_true")]
    pub expiry_ok: bool,
    #[serde(default = "default_true")]
    pub visual_ok: bool,
}

#[derive(Debug, Serialize)]
pub struct BulkSaveResult {
    #[serde(flatten)]
    pub summary: BulkSummary,
    pub alerts: Vec<AlertPayload>,
}

/// One row of the inventory status view
#[derive(Debug, Clone, Serialize)]
pub struct StatusItem {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    pub component: Component,
    pub preparation: String,
    pub current_qty: i32,
    pub safety_qty: i32,
    pub alert_threshold: i32,
    pub target_qty: i32,
    pub request_qty: i32,
    pub is_alert: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct InventoryStatus {
    pub items: Vec<StatusItem>,
    pub families: Vec<FamilyTarget>,
    pub alerts: Vec<AlertPayload>,
    pub alert_count: usize,
}

/// Ledger listing filters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct LedgerQuery {
    pub blood_type: Option<BloodType>,
    pub preparation_id: Option<i32>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<i64>,
}

impl InventoryService {
    pub fn new(db: PgPool, notifier: NotificationService) -> Self {
        Self { db, notifier }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn list_stock_levels(&self) -> AppResult<Vec<StockLevel>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {} FROM stock_levels ORDER BY preparation_id, blood_type",
            STOCK_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(StockRow::into_stock_level).collect()
    }

    /// Current quantity per stock key
    pub async fn current_quantities(&self) -> AppResult<HashMap<StockKey, i32>> {
        Ok(self
            .list_stock_levels()
            .await?
            .into_iter()
            .map(|s| (s.key(), s.current_qty))
            .collect())
    }

    /// Every stock row with its target, request quantity and alert flag.
    /// Rows without a configured threshold are left out.
    pub async fn status(&self, catalog: &Catalog, config: &ConfigService) -> AppResult<InventoryStatus> {
        let levels = self.list_stock_levels().await?;
        let thresholds = CatalogService::new(self.db.clone()).threshold_map().await?;
        let snapshot = config.load_snapshot().await?;
        let families = ConfigService::family_targets(&snapshot, catalog);
        let pair = catalog.dynamic_pair();

        let mut items = Vec::with_capacity(levels.len());
        for level in &levels {
            let Some(product) = catalog.get(level.preparation_id) else {
                continue;
            };
            let Some(threshold) = thresholds.get(&level.key()) else {
                continue;
            };

            let slot = pair.and_then(|p| {
                if p.first.id == product.id {
                    Some(PairSlot::First)
                } else if p.second.id == product.id {
                    Some(PairSlot::Second)
                } else {
                    None
                }
            });
            let family = families
                .get(&level.blood_type)
                .zip(slot);

            let target_qty = target_for(product, level.blood_type, threshold.safety_qty, family);

            items.push(StatusItem {
                blood_type: level.blood_type,
                preparation_id: product.id,
                component: product.component,
                preparation: product.preparation.clone(),
                current_qty: level.current_qty,
                safety_qty: threshold.safety_qty,
                alert_threshold: threshold.alert_threshold,
                target_qty,
                request_qty: request_qty(target_qty, level.current_qty),
                is_alert: is_alert(level.current_qty, threshold.alert_threshold),
                updated_at: level.updated_at,
            });
        }

        let stock: HashMap<StockKey, i32> = levels.iter().map(|s| (s.key(), s.current_qty)).collect();
        let keys: Vec<StockKey> = levels.iter().map(StockLevel::key).collect();
        let alerts = evaluate_touched(catalog, &keys, &stock, &thresholds);

        let mut families: Vec<FamilyTarget> = families.into_values().collect();
        families.sort_by_key(|f| f.blood_type);

        Ok(InventoryStatus {
            items,
            families,
            alert_count: alerts.len(),
            alerts,
        })
    }

    /// Ledger entries, newest first
    pub async fn list_ledger(&self, query: &LedgerQuery) -> AppResult<Vec<LedgerEntry>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LEDGER_LIMIT)
            .clamp(1, MAX_LEDGER_LIMIT);

        let rows = sqlx::query_as::<_, LedgerRow>(&ledger_listing_sql())
        .bind(query.blood_type.map(|bt| bt.as_str()))
        .bind(query.preparation_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(LedgerRow::into_entry).collect()
    }

    // ========================================================================
    // Single-item movement
    // ========================================================================

    /// Apply an in/out movement to one stock row. Rejects anything that
    /// would drive the quantity negative; nothing is written in that case.
    pub async fn apply_change(
        &self,
        catalog: &Catalog,
        actor: Option<Uuid>,
        input: UpdateStockInput,
    ) -> AppResult<UpdateStockResult> {
        validate_note(&input.note)?;
        if input.in_qty == 0 && input.out_qty == 0 {
            return Err(AppError::Validation {
                field: "in_qty".to_string(),
                message: "Either in_qty or out_qty must be positive".to_string(),
                message_ko: "입고 또는 출고 수량을 입력해야 합니다".to_string(),
            });
        }

        let product = catalog
            .get(input.preparation_id)
            .ok_or_else(|| AppError::NotFound(format!("Preparation {}", input.preparation_id)))?;

        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, StockRow>(&format!(
            "SELECT {} FROM stock_levels WHERE blood_type = $1 AND preparation_id = $2 FOR UPDATE",
            STOCK_COLUMNS
        ))
        .bind(input.blood_type.as_str())
        .bind(input.preparation_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| missing_stock_row(input.blood_type, &product.preparation))?;

        let previous_qty = current.current_qty;
        let new_qty = apply_movement(previous_qty, input.in_qty, input.out_qty).map_err(|e| match e {
            LedgerError::InsufficientStock {
                previous_qty,
                requested_out,
                ..
            } => AppError::InsufficientStock {
                blood_type: input.blood_type.to_string(),
                preparation: product.preparation.clone(),
                previous_qty,
                requested_out,
            },
            other => other.into(),
        })?;

        let note = input.note.trim();

        let stock = sqlx::query_as::<_, StockRow>(&format!(
            "UPDATE stock_levels SET current_qty = $2, note = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            STOCK_COLUMNS
        ))
        .bind(current.id)
        .bind(new_qty)
        .bind(note)
        .fetch_one(&mut *tx)
        .await?
        .into_stock_level()?;

        let entry = sqlx::query_as::<_, LedgerRow>(&format!(
            "INSERT INTO ledger_entries \
             (blood_type, preparation_id, in_qty, out_qty, note, actor_id, expiry_ok, visual_ok) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            LEDGER_COLUMNS
        ))
        .bind(input.blood_type.as_str())
        .bind(input.preparation_id)
        .bind(input.in_qty)
        .bind(input.out_qty)
        .bind(note)
        .bind(actor)
        .bind(input.expiry_ok)
        .bind(input.visual_ok)
        .fetch_one(&mut *tx)
        .await?
        .into_entry()?;

        tx.commit().await?;

        tracing::info!(
            blood_type = %input.blood_type,
            preparation = %product.preparation,
            previous_qty,
            new_qty,
            in_qty = input.in_qty,
            out_qty = input.out_qty,
            "Stock movement applied"
        );

        let alerts = self.evaluate_alerts(catalog, &[stock.key()]).await;

        Ok(UpdateStockResult {
            previous_qty,
            stock,
            entry,
            alerts,
        })
    }

    // ========================================================================
    // Bulk reconciliation
    // ========================================================================

    /// Overwrite stock rows with counted quantities.
    ///
    /// Item failures are isolated and reported per item. Everything that
    /// succeeded is committed together; if that commit fails no item is
    /// applied and the whole batch must be retried.
    pub async fn bulk_save(
        &self,
        catalog: &Catalog,
        actor: Option<Uuid>,
        input: BulkSaveInput,
    ) -> AppResult<BulkSaveResult> {
        let shared_note = input
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let mut blood_types: Vec<&str> =
            input.items.iter().map(|i| i.blood_type.as_str()).collect();
        blood_types.sort_unstable();
        blood_types.dedup();

        let mut tx = self.db.begin().await?;

        let locked = sqlx::query_as::<_, (String, i32, i32)>(
            r#"
            SELECT blood_type, preparation_id, current_qty
            FROM stock_levels
            WHERE blood_type = ANY($1)
            FOR UPDATE
            "#,
        )
        .bind(&blood_types)
        .fetch_all(&mut *tx)
        .await?;

        let mut current = HashMap::with_capacity(locked.len());
        for (blood_type, preparation_id, qty) in locked {
            current.insert(StockKey::new(decode_blood_type(&blood_type)?, preparation_id), qty);
        }

        let mut planner = BulkPlanner::new(catalog, &current);
        let mut results = Vec::with_capacity(input.items.len());
        let mut touched = Vec::new();

        for item in &input.items {
            let preparation = catalog.get(item.preparation_id).map(|p| p.preparation.clone());

            let plan = match planner.plan(item) {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::debug!(
                        blood_type = %item.blood_type,
                        preparation_id = item.preparation_id,
                        "Bulk item rejected: {}",
                        e
                    );
                    results.push(BulkItemResult::failed(item, preparation, &e));
                    continue;
                }
            };

            let note = shared_note
                .map(str::to_string)
                .unwrap_or_else(|| default_bulk_note(plan.key.blood_type, &plan.preparation));

            match write_planned_item(&mut *tx, &plan, &note, actor, input.expiry_ok, input.visual_ok).await {
                Ok(()) => {
                    tracing::debug!(
                        blood_type = %plan.key.blood_type,
                        preparation = %plan.preparation,
                        previous_qty = plan.previous_qty,
                        new_qty = plan.new_qty,
                        delta = plan.delta,
                        "Bulk item staged"
                    );
                    planner.confirm(&plan);
                    touched.push(plan.key);
                    results.push(BulkItemResult::succeeded(&plan));
                }
                Err(e) => {
                    tracing::warn!(
                        blood_type = %plan.key.blood_type,
                        preparation = %plan.preparation,
                        "Bulk item write failed: {}",
                        e
                    );
                    let err = BulkItemError::Persistence(e.to_string());
                    results.push(BulkItemResult::failed(item, preparation, &err));
                }
            }
        }

        if let Err(e) = tx.commit().await {
            tracing::error!(items = results.len(), "Bulk reconciliation commit failed: {}", e);
            return Err(AppError::CommitFailure(e.to_string()));
        }

        let summary = BulkSummary::from_results(results);
        tracing::info!(
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            "Bulk reconciliation committed"
        );

        let alerts = self.evaluate_alerts(catalog, &touched).await;

        Ok(BulkSaveResult { summary, alerts })
    }

    /// Alert evaluation never fails the mutation that triggered it
    async fn evaluate_alerts(&self, catalog: &Catalog, touched: &[StockKey]) -> Vec<AlertPayload> {
        match AlertService::new(self.db.clone()).evaluate(catalog, touched).await {
            Ok(alerts) => {
                self.notifier.dispatch(&alerts);
                alerts
            }
            Err(e) => {
                tracing::warn!("Alert evaluation failed after stock change: {}", e);
                Vec::new()
            }
        }
    }
}

/// The single path never creates stock rows; only reconciliation does
fn missing_stock_row(blood_type: BloodType, preparation: &str) -> AppError {
    AppError::Validation {
        field: "preparation_id".to_string(),
        message: format!("No stock row for {} {}", blood_type, preparation),
        message_ko: "해당 혈액형/제제의 재고 행이 없습니다".to_string(),
    }
}

/// Entries of one transaction share `logged_at`; `seq` keeps insertion order
fn ledger_listing_sql() -> String {
    format!(
        "SELECT {} FROM ledger_entries \
         WHERE ($1::text IS NULL OR blood_type = $1) \
           AND ($2::int IS NULL OR preparation_id = $2) \
         ORDER BY logged_at DESC, seq DESC \
         LIMIT $3",
        LEDGER_COLUMNS
    )
}

/// Write one planned item inside its own savepoint
async fn write_planned_item(
    conn: &mut PgConnection,
    plan: &BulkPlan,
    note: &str,
    actor: Option<Uuid>,
    expiry_ok: bool,
    visual_ok: bool,
) -> Result<(), sqlx::Error> {
    let mut savepoint = conn.begin().await?;

    match write_plan(&mut *savepoint, plan, note, actor, expiry_ok, visual_ok).await {
        Ok(()) => savepoint.commit().await,
        Err(e) => {
            savepoint.rollback().await?;
            Err(e)
        }
    }
}

async fn write_plan(
    conn: &mut PgConnection,
    plan: &BulkPlan,
    note: &str,
    actor: Option<Uuid>,
    expiry_ok: bool,
    visual_ok: bool,
) -> Result<(), sqlx::Error> {
    let blood_type = plan.key.blood_type.as_str();

    if plan.creates_row {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (blood_type, preparation_id, current_qty)
            VALUES ($1, $2, 0)
            ON CONFLICT (blood_type, preparation_id) DO NOTHING
            "#,
        )
        .bind(blood_type)
        .bind(plan.key.preparation_id)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE stock_levels
        SET current_qty = $3, note = $4, updated_at = NOW()
        WHERE blood_type = $1 AND preparation_id = $2
        "#,
    )
    .bind(blood_type)
    .bind(plan.key.preparation_id)
    .bind(plan.new_qty)
    .bind(note)
    .execute(&mut *conn)
    .await?;

    if let Some(movement) = plan.movement {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (blood_type, preparation_id, in_qty, out_qty, note, actor_id, expiry_ok, visual_ok)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(blood_type)
        .bind(plan.key.preparation_id)
        .bind(movement.in_qty)
        .bind(movement.out_qty)
        .bind(note)
        .bind(actor)
        .bind(expiry_ok)
        .bind(visual_ok)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn test_missing_stock_row_is_a_validation_error() {
        let err = missing_stock_row(BloodType::AB, "PRBC");
        assert!(matches!(&err, AppError::Validation { field, .. } if field == "preparation_id"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ledger_listing_breaks_timestamp_ties_by_insertion_order() {
        let sql = ledger_listing_sql();
        assert!(sql.contains("ORDER BY logged_at DESC, seq DESC"));
        assert!(LEDGER_COLUMNS.contains("seq"));

        let migration =
            include_str!("../../migrations/20240315000000_ledger_order_and_danger_log.sql");
        assert!(migration.contains("ALTER TABLE ledger_entries ADD COLUMN seq BIGSERIAL"));
    }
}
