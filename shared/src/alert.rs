//! Low-stock alert evaluation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::models::{BloodType, Catalog, Component, SafetyThreshold, StockKey, PRBC, PREFILTERED};

/// The red-cell family alert compares the PRBC + Prefiltered sum against the
/// PRBC threshold only, not the sum of both thresholds. This asymmetry is
/// long-standing behavior and is kept as-is.
pub const FAMILY_ALERT_REFERENCE: &str = PRBC;

/// Preparation label used on family-level alerts
pub fn family_alert_label() -> String {
    format!("{} ({} + {})", Component::Rbc, PRBC, PREFILTERED)
}

/// Structured payload handed to the notification collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub blood_type: BloodType,
    pub preparation_name: String,
    pub current_qty: i32,
    pub threshold: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prbc_qty: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_qty: Option<i32>,
}

pub fn is_alert(current_qty: i32, alert_threshold: i32) -> bool {
    current_qty < alert_threshold
}

/// Per-item check. No threshold configured means no alert.
pub fn evaluate_item(
    blood_type: BloodType,
    preparation_name: &str,
    current_qty: i32,
    alert_threshold: Option<i32>,
) -> Option<AlertPayload> {
    let threshold = alert_threshold?;
    if !is_alert(current_qty, threshold) {
        return None;
    }

    Some(AlertPayload {
        blood_type,
        preparation_name: preparation_name.to_string(),
        current_qty,
        threshold,
        prbc_qty: None,
        other_qty: None,
    })
}

/// Red-cell family check for one blood type.
///
/// Missing stock rows count as zero; a missing reference threshold means no alert.
pub fn evaluate_family(
    blood_type: BloodType,
    first_qty: Option<i32>,
    second_qty: Option<i32>,
    reference_threshold: Option<i32>,
) -> Option<AlertPayload> {
    let threshold = reference_threshold?;
    let first = first_qty.unwrap_or(0);
    let second = second_qty.unwrap_or(0);
    let total = first.saturating_add(second);

    if !is_alert(total, threshold) {
        return None;
    }

    Some(AlertPayload {
        blood_type,
        preparation_name: family_alert_label(),
        current_qty: total,
        threshold,
        prbc_qty: Some(first),
        other_qty: Some(second),
    })
}

/// Alerts for every stock row touched by a mutation.
///
/// Red-cell rows are checked once per blood type as a family; every other
/// row is checked on its own. Rows for unknown preparations are ignored.
pub fn evaluate_touched(
    catalog: &Catalog,
    touched: &[StockKey],
    stock: &HashMap<StockKey, i32>,
    thresholds: &HashMap<StockKey, SafetyThreshold>,
) -> Vec<AlertPayload> {
    let alert_threshold =
        |key: StockKey| thresholds.get(&key).map(|t| t.alert_threshold);

    let pair = catalog.dynamic_pair();
    let reference = catalog.by_preparation(FAMILY_ALERT_REFERENCE);

    let mut family_checked = BTreeSet::new();
    let mut item_checked = BTreeSet::new();
    let mut alerts = Vec::new();

    for key in touched {
        let Some(product) = catalog.get(key.preparation_id) else {
            continue;
        };

        match (product.is_dynamic(), pair, reference) {
            (true, Some(pair), Some(reference)) => {
                if !family_checked.insert(key.blood_type) {
                    continue;
                }
                let first = stock.get(&StockKey::new(key.blood_type, pair.first.id)).copied();
                let second = stock.get(&StockKey::new(key.blood_type, pair.second.id)).copied();
                let threshold = alert_threshold(StockKey::new(key.blood_type, reference.id));
                alerts.extend(evaluate_family(key.blood_type, first, second, threshold));
            }
            _ => {
                if !item_checked.insert(*key) {
                    continue;
                }
                let current = stock.get(key).copied().unwrap_or(0);
                alerts.extend(evaluate_item(
                    key.blood_type,
                    &product.preparation,
                    current,
                    alert_threshold(*key),
                ));
            }
        }
    }

    alerts
}

// ============================================================================
// Danger Log
// ============================================================================

/// Red-cell stock in days of consumption, 2 dp. `None` when the rate is not
/// positive.
pub fn stock_ratio(qty: i32, daily_consumption_rate: Decimal) -> Option<Decimal> {
    if daily_consumption_rate <= Decimal::ZERO {
        return None;
    }
    Some((Decimal::from(qty) / daily_consumption_rate).round_dp(2))
}

/// A danger-stock event acknowledged by staff, kept as an audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DangerAlertRecord {
    pub id: i64,
    pub alert_date: DateTime<Utc>,
    pub blood_type: BloodType,
    /// Red-cell family total when the event was raised
    pub rbc_qty: i32,
    pub danger_threshold: Option<Decimal>,
    pub actual_ratio: Option<Decimal>,
    pub reason: Option<String>,
    pub actor_id: Option<Uuid>,
}
