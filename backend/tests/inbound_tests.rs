//! Inbound import normalization and CSV export tests

use blood_bank_backend::services::inbound::InboundRowInput;
use blood_bank_backend::services::{AnalyticsService, InboundService};
use blood_bank_backend::AppError;
use chrono::NaiveDate;
use shared::{BloodType, Catalog, Component, DailyFamilyRow};

fn row(blood_type: &str, preparation: &str, qty: i32) -> InboundRowInput {
    InboundRowInput {
        receive_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        blood_type: blood_type.to_string(),
        preparation: preparation.to_string(),
        qty,
    }
}

// ============================================================================
// Normalization
// ============================================================================

mod normalization_tests {
    use super::*;

    #[test]
    fn test_rh_suffix_and_alias_resolved() {
        let catalog = Catalog::seed();
        let records =
            InboundService::normalize_rows(&catalog, &[row("O+", "Pre-R", 4), row("ab-", "FFP", 2)])
                .unwrap();

        assert_eq!(records[0].blood_type, BloodType::O);
        assert_eq!(records[0].preparation_id, 2);
        assert_eq!(records[0].qty, 4);
        assert_eq!(records[1].blood_type, BloodType::AB);
        assert_eq!(records[1].preparation_id, 5);
    }

    #[test]
    fn test_unknown_preparation_rejects_import() {
        let catalog = Catalog::seed();
        let err = InboundService::normalize_rows(
            &catalog,
            &[row("A", "PRBC", 1), row("A", "Whole blood", 1)],
        )
        .unwrap_err();

        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "rows[1].preparation"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_blood_type_rejects_import() {
        let catalog = Catalog::seed();
        let err = InboundService::normalize_rows(&catalog, &[row("C", "PRBC", 1)]).unwrap_err();

        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "rows[0].blood_type"));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let catalog = Catalog::seed();
        assert!(InboundService::normalize_rows(&catalog, &[row("B", "SDP", -2)]).is_err());
    }
}

// ============================================================================
// CSV Export
// ============================================================================

mod csv_tests {
    use super::*;

    #[test]
    fn test_family_rows_csv() {
        let rows = vec![
            DailyFamilyRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                component: Component::Rbc,
                blood_type: BloodType::A,
                qty: 9,
            },
            DailyFamilyRow {
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                component: Component::Cryo,
                blood_type: BloodType::AB,
                qty: 3,
            },
        ];

        let csv = AnalyticsService::export_to_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "date,component,blood_type,qty");
        assert_eq!(lines[1], "2024-03-01,RBC,A,9");
        assert_eq!(lines[2], "2024-03-01,Cryo,AB,3");
    }
}
