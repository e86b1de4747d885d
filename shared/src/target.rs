//! Safe-target arithmetic
//!
//! Red-cell targets are computed as `ceil(rate * factor)`, plus a fixed bonus
//! for group O, and split across PRBC / Prefiltered so the shares always sum
//! to the family target. Every other family uses its stored `safety_qty`,
//! except cryoprecipitate AB, which is pinned.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{BloodType, Component, Parameters, Product};

/// Extra units added to the group O red-cell target
pub const UNIVERSAL_DONOR_BONUS: i32 = 4;

/// Fixed target for cryoprecipitate AB, independent of any formula
pub const CRYO_AB_TARGET: i32 = 10;

/// Red-cell family target before splitting. Always rounds up.
pub fn dynamic_target(
    daily_consumption_rate: Decimal,
    safety_factor: Decimal,
    blood_type: BloodType,
) -> i32 {
    let base = (daily_consumption_rate * safety_factor)
        .ceil()
        .to_i32()
        .unwrap_or(i32::MAX);

    if blood_type.is_universal_donor() {
        base.saturating_add(UNIVERSAL_DONOR_BONUS)
    } else {
        base
    }
}

/// Split a family target by `ratio` (clamped to 0..=1).
///
/// The first share is rounded half-to-even; the second is the remainder,
/// so `first + second == target` for every input.
pub fn split_target(target: i32, ratio: Decimal) -> (i32, i32) {
    let ratio = ratio.clamp(Decimal::ZERO, Decimal::ONE);
    let first = (Decimal::from(target) * ratio)
        .round()
        .to_i32()
        .unwrap_or(target);
    (first, target - first)
}

/// Replenishment suggestion
pub fn request_qty(target: i32, current_qty: i32) -> i32 {
    (target - current_qty).max(0)
}

/// Computed red-cell target for one blood type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FamilyTarget {
    pub blood_type: BloodType,
    pub parameters: Parameters,
    pub ratio: Decimal,
    pub total: i32,
    pub first_share: i32,
    pub second_share: i32,
}

impl FamilyTarget {
    pub fn compute(blood_type: BloodType, parameters: Parameters, ratio: Decimal) -> Self {
        let total = dynamic_target(
            parameters.daily_consumption_rate,
            parameters.safety_factor,
            blood_type,
        );
        let (first_share, second_share) = split_target(total, ratio);

        Self {
            blood_type,
            parameters,
            ratio,
            total,
            first_share,
            second_share,
        }
    }
}

/// Position of a product inside the red-cell pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSlot {
    First,
    Second,
}

/// Target for a single stock row.
///
/// `family` carries the red-cell computation and the row's slot in the pair;
/// it is ignored for every other component.
pub fn target_for(
    product: &Product,
    blood_type: BloodType,
    safety_qty: i32,
    family: Option<(&FamilyTarget, PairSlot)>,
) -> i32 {
    if product.component == Component::Cryo && blood_type == BloodType::AB {
        return CRYO_AB_TARGET;
    }

    match (product.is_dynamic(), family) {
        (true, Some((family, PairSlot::First))) => family.first_share,
        (true, Some((family, PairSlot::Second))) => family.second_share,
        _ => safety_qty,
    }
}
