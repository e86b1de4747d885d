//! Ledger mutation planning
//!
//! Pure arithmetic behind the two mutation paths. The single-item path takes
//! a delta and rejects anything that would drive stock negative. The bulk
//! path takes absolute quantities, overwrites the stock row and only emits a
//! ledger movement when the quantity actually changed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{BloodType, Catalog, StockKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient stock: current {previous_qty}, requested out {requested_out}")]
    InsufficientStock {
        previous_qty: i32,
        in_qty: i32,
        requested_out: i32,
    },

    #[error("Quantities must not be negative")]
    NegativeQuantity,

    #[error("A note is required for every stock movement")]
    EmptyNote,
}

/// New quantity after one movement. Never clamps.
pub fn apply_movement(previous_qty: i32, in_qty: i32, out_qty: i32) -> Result<i32, LedgerError> {
    if in_qty < 0 || out_qty < 0 {
        return Err(LedgerError::NegativeQuantity);
    }

    let new_qty = previous_qty as i64 + in_qty as i64 - out_qty as i64;
    if new_qty < 0 {
        return Err(LedgerError::InsufficientStock {
            previous_qty,
            in_qty,
            requested_out: out_qty,
        });
    }

    i32::try_from(new_qty).map_err(|_| LedgerError::NegativeQuantity)
}

/// Require a non-blank note on single-item movements
pub fn validate_note(note: &str) -> Result<(), LedgerError> {
    if note.trim().is_empty() {
        return Err(LedgerError::EmptyNote);
    }
    Ok(())
}

/// One row of a bulk reconciliation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    /// Absolute quantity counted on the shelf
    pub qty: i32,
}

/// Ledger movement derived from a bulk delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Movement {
    pub in_qty: i32,
    pub out_qty: i32,
}

impl Movement {
    /// `None` when nothing moved
    pub fn from_delta(delta: i32) -> Option<Self> {
        match delta {
            0 => None,
            d if d > 0 => Some(Self { in_qty: d, out_qty: 0 }),
            d => Some(Self {
                in_qty: 0,
                out_qty: -d,
            }),
        }
    }
}

/// Planned write for one bulk item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkPlan {
    pub key: StockKey,
    pub preparation: String,
    /// Stock row did not exist and will be created at zero first
    pub creates_row: bool,
    pub previous_qty: i32,
    pub new_qty: i32,
    pub delta: i32,
    pub movement: Option<Movement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum BulkItemError {
    #[error("Unknown preparation id {0}")]
    UnknownPreparation(i32),

    #[error("Quantity must not be negative (got {0})")]
    NegativeQuantity(i32),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Plans bulk items one at a time against a working copy of stock.
///
/// The working copy only advances through [`BulkPlanner::confirm`], so an
/// item whose write was rolled back leaves no trace for later items with the
/// same key.
#[derive(Debug, Clone)]
pub struct BulkPlanner<'a> {
    catalog: &'a Catalog,
    working: HashMap<StockKey, i32>,
}

impl<'a> BulkPlanner<'a> {
    pub fn new(catalog: &'a Catalog, current: &HashMap<StockKey, i32>) -> Self {
        Self {
            catalog,
            working: current.clone(),
        }
    }

    /// Compute one item's write from the confirmed state
    pub fn plan(&self, item: &BulkItem) -> Result<BulkPlan, BulkItemError> {
        let product = self
            .catalog
            .get(item.preparation_id)
            .ok_or(BulkItemError::UnknownPreparation(item.preparation_id))?;

        if item.qty < 0 {
            return Err(BulkItemError::NegativeQuantity(item.qty));
        }

        let key = StockKey::new(item.blood_type, item.preparation_id);
        let existing = self.working.get(&key).copied();
        let previous_qty = existing.unwrap_or(0);
        let delta = item.qty - previous_qty;

        Ok(BulkPlan {
            key,
            preparation: product.preparation.clone(),
            creates_row: existing.is_none(),
            previous_qty,
            new_qty: item.qty,
            delta,
            movement: Movement::from_delta(delta),
        })
    }

    /// Record that a planned write was persisted
    pub fn confirm(&mut self, plan: &BulkPlan) {
        self.working.insert(plan.key, plan.new_qty);
    }
}

/// Per-item outcome reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemResult {
    pub blood_type: BloodType,
    pub preparation_id: i32,
    pub preparation: Option<String>,
    pub previous_qty: i32,
    pub new_qty: i32,
    pub delta: i32,
    pub success: bool,
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn succeeded(plan: &BulkPlan) -> Self {
        Self {
            blood_type: plan.key.blood_type,
            preparation_id: plan.key.preparation_id,
            preparation: Some(plan.preparation.clone()),
            previous_qty: plan.previous_qty,
            new_qty: plan.new_qty,
            delta: plan.delta,
            success: true,
            error: None,
        }
    }

    pub fn failed(item: &BulkItem, preparation: Option<String>, error: &BulkItemError) -> Self {
        Self {
            blood_type: item.blood_type,
            preparation_id: item.preparation_id,
            preparation,
            previous_qty: 0,
            new_qty: item.qty,
            delta: 0,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Aggregate outcome of a committed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkSummary {
    pub fn from_results(results: Vec<BulkItemResult>) -> Self {
        let success = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            success,
            failed: results.len() - success,
            results,
        }
    }
}

/// Fallback note for a bulk movement
pub fn default_bulk_note(blood_type: BloodType, preparation: &str) -> String {
    format!("{} {} stock reconciliation", blood_type, preparation)
}
