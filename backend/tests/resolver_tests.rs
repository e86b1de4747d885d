//! Configuration resolution tests
//!
//! - Tier priority: specific → common → legacy ratio → fallback
//! - Resolution is total and deterministic
//! - Split ratio chain and change diffing

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    diff_parameters, resolve, resolve_split_ratio, BloodType, ConfigOverride, ConfigSnapshot,
    Parameters, ResolutionTier, DEFAULT_PARAMETER_SET, LEGACY_SAFETY_RATIO_KEY,
    PARAM_DAILY_CONSUMPTION_RATE, PARAM_RATIO_PERCENT, PARAM_SAFETY_FACTOR, SPLIT_RATIO_KEY,
};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn override_row(
    blood_type: Option<BloodType>,
    preparation_id: Option<i32>,
    rate: &str,
    factor: &str,
    ratio_percent: Option<&str>,
) -> ConfigOverride {
    ConfigOverride {
        id: Uuid::new_v4(),
        blood_type,
        preparation_id,
        parameter_set: DEFAULT_PARAMETER_SET.to_string(),
        daily_consumption_rate: dec(rate),
        safety_factor: dec(factor),
        ratio_percent: ratio_percent.map(dec),
        updated_at: Utc::now(),
    }
}

fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

mod unit_tests {
    use super::*;

    #[test]
    fn test_specific_row_wins() {
        let snapshot = ConfigSnapshot::new(
            vec![
                override_row(None, None, "5.0", "3.0", None),
                override_row(Some(BloodType::A), Some(1), "8.0", "1.5", None),
            ],
            settings(&[(LEGACY_SAFETY_RATIO_KEY, "50")]),
        );

        let resolution = resolve(&snapshot, BloodType::A, 1);
        assert_eq!(resolution.tier, ResolutionTier::Specific);
        assert_eq!(resolution.parameters.daily_consumption_rate, dec("8.0"));
        assert_eq!(resolution.parameters.safety_factor, dec("1.5"));
    }

    #[test]
    fn test_common_row_covers_other_pairs() {
        let snapshot = ConfigSnapshot::new(
            vec![
                override_row(None, None, "5.0", "3.0", None),
                override_row(Some(BloodType::A), Some(1), "8.0", "1.5", None),
            ],
            HashMap::new(),
        );

        let resolution = resolve(&snapshot, BloodType::B, 1);
        assert_eq!(resolution.tier, ResolutionTier::Common);
        assert_eq!(resolution.parameters.daily_consumption_rate, dec("5.0"));

        // Same blood type, different preparation
        assert_eq!(resolve(&snapshot, BloodType::A, 2).tier, ResolutionTier::Common);
    }

    #[test]
    fn test_legacy_ratio_tier() {
        let snapshot = ConfigSnapshot::new(vec![], settings(&[(LEGACY_SAFETY_RATIO_KEY, "50")]));

        let resolution = resolve(&snapshot, BloodType::O, 1);
        assert_eq!(resolution.tier, ResolutionTier::LegacyRatio);
        assert_eq!(resolution.parameters.daily_consumption_rate, dec("3.0"));
        // 0.5 * 4
        assert_eq!(resolution.parameters.safety_factor, dec("2.0"));
    }

    #[test]
    fn test_invalid_legacy_ratio_falls_through() {
        for raw in ["abc", "-10", "150", "0"] {
            let snapshot = ConfigSnapshot::new(vec![], settings(&[(LEGACY_SAFETY_RATIO_KEY, raw)]));
            let resolution = resolve(&snapshot, BloodType::A, 1);
            assert_eq!(resolution.tier, ResolutionTier::Default, "raw = {}", raw);
            assert_eq!(resolution.parameters, Parameters::fallback());
        }
    }

    #[test]
    fn test_fallback_values() {
        let fallback = Parameters::fallback();
        assert_eq!(fallback.daily_consumption_rate, dec("3.0"));
        assert_eq!(fallback.safety_factor, dec("2.0"));
    }

    #[test]
    fn test_chain_order() {
        assert_eq!(
            ResolutionTier::CHAIN,
            [
                ResolutionTier::Specific,
                ResolutionTier::Common,
                ResolutionTier::LegacyRatio,
                ResolutionTier::Default,
            ]
        );
    }

    #[test]
    fn test_split_ratio_chain() {
        let empty = ConfigSnapshot::default();
        assert_eq!(resolve_split_ratio(&empty, BloodType::A, 1), dec("0.5"));

        let global = ConfigSnapshot::new(vec![], settings(&[(SPLIT_RATIO_KEY, "70")]));
        assert_eq!(resolve_split_ratio(&global, BloodType::A, 1), dec("0.7"));

        let common = ConfigSnapshot::new(
            vec![override_row(None, None, "3.0", "2.0", Some("60"))],
            settings(&[(SPLIT_RATIO_KEY, "70")]),
        );
        assert_eq!(resolve_split_ratio(&common, BloodType::A, 1), dec("0.6"));

        let specific = ConfigSnapshot::new(
            vec![
                override_row(None, None, "3.0", "2.0", Some("60")),
                override_row(Some(BloodType::A), Some(1), "3.0", "2.0", Some("80")),
            ],
            settings(&[(SPLIT_RATIO_KEY, "70")]),
        );
        assert_eq!(resolve_split_ratio(&specific, BloodType::A, 1), dec("0.8"));
        assert_eq!(resolve_split_ratio(&specific, BloodType::B, 1), dec("0.6"));
    }

    #[test]
    fn test_split_ratio_skips_rows_without_ratio() {
        let snapshot = ConfigSnapshot::new(
            vec![override_row(Some(BloodType::A), Some(1), "3.0", "2.0", None)],
            settings(&[(SPLIT_RATIO_KEY, "30")]),
        );
        assert_eq!(resolve_split_ratio(&snapshot, BloodType::A, 1), dec("0.3"));
    }

    #[test]
    fn test_split_ratio_ignores_out_of_range_global() {
        let snapshot = ConfigSnapshot::new(vec![], settings(&[(SPLIT_RATIO_KEY, "250")]));
        assert_eq!(resolve_split_ratio(&snapshot, BloodType::A, 1), dec("0.5"));
    }

    #[test]
    fn test_diff_new_row_reports_everything() {
        let changes = diff_parameters(None, dec("4.0"), dec("2.5"), Some(dec("60")));
        let names: Vec<_> = changes.iter().map(|c| c.parameter_name).collect();
        assert_eq!(
            names,
            vec![PARAM_DAILY_CONSUMPTION_RATE, PARAM_SAFETY_FACTOR, PARAM_RATIO_PERCENT]
        );
        assert!(changes.iter().all(|c| c.old_value.is_none()));
    }

    #[test]
    fn test_diff_only_changed_values() {
        let existing = override_row(None, None, "3.0", "2.0", Some("50"));

        let changes = diff_parameters(Some(&existing), dec("3.0"), dec("2.5"), None);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].parameter_name, PARAM_SAFETY_FACTOR);
        assert_eq!(changes[0].old_value, Some(dec("2.0")));
        assert_eq!(changes[0].new_value, dec("2.5"));

        let unchanged = diff_parameters(Some(&existing), dec("3.0"), dec("2.0"), Some(dec("50")));
        assert!(unchanged.is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;

    fn blood_type_strategy() -> impl Strategy<Value = BloodType> {
        prop_oneof![
            Just(BloodType::A),
            Just(BloodType::B),
            Just(BloodType::O),
            Just(BloodType::AB),
        ]
    }

    /// Arbitrary mix of scoped rows, an optional common row and an optional legacy ratio
    fn snapshot_strategy() -> impl Strategy<Value = ConfigSnapshot> {
        (
            prop::collection::vec((blood_type_strategy(), 1i32..=6), 0..6),
            any::<bool>(),
            prop::option::of(-20i32..150),
        )
            .prop_map(|(scoped, with_common, legacy)| {
                let mut overrides: Vec<ConfigOverride> = scoped
                    .into_iter()
                    .map(|(bt, prep)| override_row(Some(bt), Some(prep), "4.0", "1.5", None))
                    .collect();
                if with_common {
                    overrides.push(override_row(None, None, "5.0", "3.0", None));
                }
                let settings = legacy
                    .map(|v| settings(&[(LEGACY_SAFETY_RATIO_KEY, v.to_string().as_str())]))
                    .unwrap_or_default();
                ConfigSnapshot::new(overrides, settings)
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Exactly one tier answers, and it is the first one able to
        #[test]
        fn prop_resolution_is_total(
            snapshot in snapshot_strategy(),
            blood_type in blood_type_strategy(),
            preparation_id in 1i32..=6,
        ) {
            let resolution = resolve(&snapshot, blood_type, preparation_id);

            let first_answering = ResolutionTier::CHAIN
                .into_iter()
                .find(|tier| tier.try_resolve(&snapshot, blood_type, preparation_id).is_some());
            prop_assert_eq!(Some(resolution.tier), first_answering);
        }

        #[test]
        fn prop_resolution_is_deterministic(
            snapshot in snapshot_strategy(),
            blood_type in blood_type_strategy(),
            preparation_id in 1i32..=6,
        ) {
            let first = resolve(&snapshot, blood_type, preparation_id);
            let second = resolve(&snapshot, blood_type, preparation_id);
            prop_assert_eq!(first, second);
        }

        /// Resolved split ratio is always a valid fraction
        #[test]
        fn prop_split_ratio_in_unit_interval(
            global in -50i32..200,
            blood_type in blood_type_strategy(),
        ) {
            let snapshot = ConfigSnapshot::new(
                vec![],
                settings(&[(SPLIT_RATIO_KEY, global.to_string().as_str())]),
            );
            let ratio = resolve_split_ratio(&snapshot, blood_type, 1);
            prop_assert!(ratio >= Decimal::ZERO && ratio <= Decimal::ONE);
        }
    }
}
