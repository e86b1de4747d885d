//! Consumption-rate and safety-factor configuration models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BloodType;

/// Parameter set used when none is named
pub const DEFAULT_PARAMETER_SET: &str = "default";

/// Parameter names recorded in the change history
pub const PARAM_DAILY_CONSUMPTION_RATE: &str = "daily_consumption_rate";
pub const PARAM_SAFETY_FACTOR: &str = "safety_factor";
pub const PARAM_RATIO_PERCENT: &str = "ratio_percent";

/// Scoped override row. `None` in a scoping field means "ALL".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverride {
    pub id: Uuid,
    pub blood_type: Option<BloodType>,
    pub preparation_id: Option<i32>,
    pub parameter_set: String,
    pub daily_consumption_rate: Decimal,
    pub safety_factor: Decimal,
    /// Legacy split percentage for the red-cell pair (0-100)
    pub ratio_percent: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigOverride {
    /// Both scoping fields wildcarded
    pub fn is_common(&self) -> bool {
        self.blood_type.is_none() && self.preparation_id.is_none()
    }

    pub fn is_scoped_to(&self, blood_type: BloodType, preparation_id: i32) -> bool {
        self.blood_type == Some(blood_type) && self.preparation_id == Some(preparation_id)
    }

    pub fn parameters(&self) -> Parameters {
        Parameters {
            daily_consumption_rate: self.daily_consumption_rate,
            safety_factor: self.safety_factor,
        }
    }
}

/// Append-only audit of a single parameter change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChangeRecord {
    pub id: Uuid,
    pub blood_type: Option<BloodType>,
    pub preparation_id: Option<i32>,
    pub parameter_name: String,
    pub old_value: Option<Decimal>,
    pub new_value: Decimal,
    pub reason: String,
    pub actor: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

/// Effective (rate, factor) pair for a blood type and preparation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    pub daily_consumption_rate: Decimal,
    pub safety_factor: Decimal,
}

impl Parameters {
    /// Hard-coded fallback: 3 units/day, factor 2
    pub fn fallback() -> Self {
        Self {
            daily_consumption_rate: Decimal::new(30, 1),
            safety_factor: Decimal::new(20, 1),
        }
    }
}

/// A single parameter whose value differs between the stored and requested row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterChange {
    pub parameter_name: &'static str,
    pub old_value: Option<Decimal>,
    pub new_value: Decimal,
}

/// Compute which parameters a write actually changes.
///
/// A brand-new row reports every supplied parameter with `old_value = None`.
/// `ratio_percent` is only compared when the caller supplies it.
pub fn diff_parameters(
    existing: Option<&ConfigOverride>,
    daily_consumption_rate: Decimal,
    safety_factor: Decimal,
    ratio_percent: Option<Decimal>,
) -> Vec<ParameterChange> {
    let mut changes = Vec::new();

    let old_rate = existing.map(|e| e.daily_consumption_rate);
    if old_rate != Some(daily_consumption_rate) {
        changes.push(ParameterChange {
            parameter_name: PARAM_DAILY_CONSUMPTION_RATE,
            old_value: old_rate,
            new_value: daily_consumption_rate,
        });
    }

    let old_factor = existing.map(|e| e.safety_factor);
    if old_factor != Some(safety_factor) {
        changes.push(ParameterChange {
            parameter_name: PARAM_SAFETY_FACTOR,
            old_value: old_factor,
            new_value: safety_factor,
        });
    }

    if let Some(ratio) = ratio_percent {
        let old_ratio = existing.and_then(|e| e.ratio_percent);
        if old_ratio != Some(ratio) {
            changes.push(ParameterChange {
                parameter_name: PARAM_RATIO_PERCENT,
                old_value: old_ratio,
                new_value: ratio,
            });
        }
    }

    changes
}
