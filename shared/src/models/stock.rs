//! Stock snapshot, ledger and threshold models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BloodType, StockKey};

/// Current stock for one (blood type, preparation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub id: Uuid,
    pub blood_type: BloodType,
    pub preparation_id: i32,
    pub current_qty: i32,
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.blood_type, self.preparation_id)
    }
}

/// Append-only stock movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub logged_at: DateTime<Utc>,
    /// Insertion order, breaks ties on `logged_at`
    pub seq: i64,
    pub blood_type: BloodType,
    pub preparation_id: i32,
    pub in_qty: i32,
    pub out_qty: i32,
    pub note: String,
    pub actor_id: Option<Uuid>,
    /// Expiry date checked at reconciliation
    pub expiry_ok: bool,
    /// Bag appearance checked at reconciliation
    pub visual_ok: bool,
}

/// Reference target and alert floor for one (blood type, preparation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyThreshold {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    pub safety_qty: i32,
    pub alert_threshold: i32,
}

impl SafetyThreshold {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.blood_type, self.preparation_id)
    }
}

/// Externally imported receipt fact. Never part of stock or replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRecord {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    pub qty: i32,
    pub receive_date: NaiveDate,
}
