//! Resolution of consumption-rate and safety-factor parameters
//!
//! Tiers are tried in order and the first one that answers wins:
//! 1. override row scoped to exactly (blood type, preparation)
//! 2. common override row (both scopes wildcarded)
//! 3. legacy global ratio percentage, read as `safety_factor = ratio * 4`
//! 4. hard-coded fallback (3.0, 2.0)
//!
//! Resolution never fails. With no configuration at all the fallback applies.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{BloodType, ConfigOverride, Parameters};

/// `master_config` key of the legacy single safety ratio
pub const LEGACY_SAFETY_RATIO_KEY: &str = "safety_ratio_percent";

/// `master_config` key of the global red-cell split percentage
pub const SPLIT_RATIO_KEY: &str = "rbc_ratio_percent";

/// Split used when nothing is configured
pub const DEFAULT_SPLIT_RATIO: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Multiplier turning the legacy ratio into a safety factor
const LEGACY_RATIO_MULTIPLIER: i64 = 4;

/// Point-in-time view of every stored configuration row
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub overrides: Vec<ConfigOverride>,
    pub settings: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub fn new(overrides: Vec<ConfigOverride>, settings: HashMap<String, String>) -> Self {
        Self {
            overrides,
            settings,
        }
    }

    fn specific(&self, blood_type: BloodType, preparation_id: i32) -> Option<&ConfigOverride> {
        self.overrides
            .iter()
            .find(|o| o.is_scoped_to(blood_type, preparation_id))
    }

    fn common(&self) -> Option<&ConfigOverride> {
        self.overrides.iter().find(|o| o.is_common())
    }

    /// A stored percentage setting converted to a fraction, if present and within 0..=100
    fn percent_setting(&self, key: &str) -> Option<Decimal> {
        let raw = self.settings.get(key)?;
        let percent: Decimal = raw.trim().parse().ok()?;
        valid_fraction(percent)
    }
}

fn valid_fraction(percent: Decimal) -> Option<Decimal> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return None;
    }
    Some(percent / Decimal::ONE_HUNDRED)
}

/// One step of the resolution chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Specific,
    Common,
    LegacyRatio,
    Default,
}

impl ResolutionTier {
    /// Priority order, most specific first
    pub const CHAIN: [ResolutionTier; 4] = [
        ResolutionTier::Specific,
        ResolutionTier::Common,
        ResolutionTier::LegacyRatio,
        ResolutionTier::Default,
    ];

    /// Answer from this tier alone, or `None` to fall through
    pub fn try_resolve(
        self,
        snapshot: &ConfigSnapshot,
        blood_type: BloodType,
        preparation_id: i32,
    ) -> Option<Parameters> {
        match self {
            ResolutionTier::Specific => snapshot
                .specific(blood_type, preparation_id)
                .map(ConfigOverride::parameters),
            ResolutionTier::Common => snapshot.common().map(ConfigOverride::parameters),
            ResolutionTier::LegacyRatio => {
                let ratio = snapshot.percent_setting(LEGACY_SAFETY_RATIO_KEY)?;
                if ratio <= Decimal::ZERO {
                    return None;
                }
                Some(Parameters {
                    daily_consumption_rate: Parameters::fallback().daily_consumption_rate,
                    safety_factor: ratio * Decimal::from(LEGACY_RATIO_MULTIPLIER),
                })
            }
            ResolutionTier::Default => Some(Parameters::fallback()),
        }
    }
}

/// Resolved parameters plus the tier that produced them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub tier: ResolutionTier,
    #[serde(flatten)]
    pub parameters: Parameters,
}

/// Resolve the effective parameters for a (blood type, preparation) pair
pub fn resolve(snapshot: &ConfigSnapshot, blood_type: BloodType, preparation_id: i32) -> Resolution {
    ResolutionTier::CHAIN
        .into_iter()
        .find_map(|tier| {
            tier.try_resolve(snapshot, blood_type, preparation_id)
                .map(|parameters| Resolution { tier, parameters })
        })
        .unwrap_or(Resolution {
            tier: ResolutionTier::Default,
            parameters: Parameters::fallback(),
        })
}

/// Resolve the fraction of the red-cell target allotted to the first sub-product.
///
/// Specific row, then common row, then the global split setting, then 0.5.
/// Out-of-range stored values are skipped.
pub fn resolve_split_ratio(
    snapshot: &ConfigSnapshot,
    blood_type: BloodType,
    first_preparation_id: i32,
) -> Decimal {
    let from_row = |row: Option<&ConfigOverride>| {
        row.and_then(|o| o.ratio_percent).and_then(valid_fraction)
    };

    from_row(snapshot.specific(blood_type, first_preparation_id))
        .or_else(|| from_row(snapshot.common()))
        .or_else(|| snapshot.percent_setting(SPLIT_RATIO_KEY))
        .unwrap_or(DEFAULT_SPLIT_RATIO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_ratio_is_half() {
        assert_eq!(DEFAULT_SPLIT_RATIO, Decimal::new(5, 1));
    }

    #[test]
    fn test_empty_snapshot_falls_to_default() {
        let resolution = resolve(&ConfigSnapshot::default(), BloodType::A, 1);
        assert_eq!(resolution.tier, ResolutionTier::Default);
        assert_eq!(resolution.parameters, Parameters::fallback());
    }
}
