//! Validation utilities for the blood bank inventory service
//!
//! Every check runs before any write, so a rejected request never leaves a
//! partial change behind.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::BloodType;

/// Minimum trimmed length of a configuration change reason
pub const MIN_REASON_LEN: usize = 5;

/// Date format accepted by report queries
pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest report window, in days between start and end
pub const MAX_REPORT_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("Report window of {days} days exceeds the {MAX_REPORT_WINDOW_DAYS}-day limit")]
    WindowTooLong { days: i64 },

    #[error("Change reason must be at least {MIN_REASON_LEN} characters")]
    ReasonTooShort,

    #[error("{field} must be in {range}")]
    OutOfRange {
        field: &'static str,
        range: &'static str,
    },

    #[error("blood_type and preparation_id must be given together or not at all")]
    HalfScoped,

    #[error("{0} must not be negative")]
    Negative(&'static str),
}

impl ValidationError {
    /// Request field the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidDate(_)
            | ValidationError::InvertedRange { .. }
            | ValidationError::WindowTooLong { .. } => "date",
            ValidationError::ReasonTooShort => "change_reason",
            ValidationError::OutOfRange { field, .. } => field,
            ValidationError::HalfScoped => "preparation_id",
            ValidationError::Negative(field) => field,
        }
    }
}

// ============================================================================
// Date Validations
// ============================================================================

/// Inclusive report window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

pub fn parse_report_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), REPORT_DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// Resolve optional query dates: end defaults to today, start to
/// `end - default_days`. Windows longer than [`MAX_REPORT_WINDOW_DAYS`] are
/// rejected.
pub fn report_window(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
    default_days: i64,
) -> Result<DateRange, ValidationError> {
    let end = match end {
        Some(raw) => parse_report_date(raw)?,
        None => today,
    };
    let start = match start {
        Some(raw) => parse_report_date(raw)?,
        None => end
            .checked_sub_signed(Duration::days(default_days))
            .ok_or_else(|| ValidationError::InvalidDate(end.to_string()))?,
    };

    if start > end {
        return Err(ValidationError::InvertedRange { start, end });
    }

    let days = (end - start).num_days();
    if days > MAX_REPORT_WINDOW_DAYS {
        return Err(ValidationError::WindowTooLong { days });
    }

    Ok(DateRange { start, end })
}

// ============================================================================
// Configuration Validations
// ============================================================================

/// Returns the trimmed reason
pub fn validate_change_reason(reason: &str) -> Result<String, ValidationError> {
    let trimmed = reason.trim();
    if trimmed.chars().count() < MIN_REASON_LEN {
        return Err(ValidationError::ReasonTooShort);
    }
    Ok(trimmed.to_string())
}

/// Units per day, `0 < rate <= 100`
pub fn validate_daily_consumption_rate(rate: Decimal) -> Result<(), ValidationError> {
    if rate <= Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "daily_consumption_rate",
            range: "(0, 100]",
        });
    }
    Ok(())
}

/// Days of cover, `0.5 <= factor <= 10`
pub fn validate_safety_factor(factor: Decimal) -> Result<(), ValidationError> {
    if factor < Decimal::new(5, 1) || factor > Decimal::TEN {
        return Err(ValidationError::OutOfRange {
            field: "safety_factor",
            range: "[0.5, 10]",
        });
    }
    Ok(())
}

pub fn validate_ratio_percent(percent: Decimal) -> Result<(), ValidationError> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "ratio_percent",
            range: "[0, 100]",
        });
    }
    Ok(())
}

/// Override rows are either fully scoped or fully common
pub fn validate_scope(
    blood_type: Option<BloodType>,
    preparation_id: Option<i32>,
) -> Result<(), ValidationError> {
    if blood_type.is_some() != preparation_id.is_some() {
        return Err(ValidationError::HalfScoped);
    }
    Ok(())
}

// ============================================================================
// Stock Validations
// ============================================================================

pub fn validate_quantity(field: &'static str, qty: i32) -> Result<(), ValidationError> {
    if qty < 0 {
        return Err(ValidationError::Negative(field));
    }
    Ok(())
}

pub fn validate_threshold(safety_qty: i32, alert_threshold: i32) -> Result<(), ValidationError> {
    validate_quantity("safety_qty", safety_qty)?;
    validate_quantity("alert_threshold", alert_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ========================================================================
    // Date Validation Tests
    // ========================================================================

    #[test]
    fn test_parse_report_date() {
        assert_eq!(parse_report_date("2024-03-01"), Ok(date(2024, 3, 1)));
        assert_eq!(parse_report_date(" 2024-03-01 "), Ok(date(2024, 3, 1)));
        assert!(parse_report_date("2024/03/01").is_err());
        assert!(parse_report_date("2024-02-30").is_err());
        assert!(parse_report_date("").is_err());
    }

    #[test]
    fn test_report_window_defaults() {
        let today = date(2024, 3, 31);
        let window = report_window(None, None, today, 30).unwrap();
        assert_eq!(window.end, today);
        assert_eq!(window.start, date(2024, 3, 1));
    }

    #[test]
    fn test_report_window_explicit_start_only() {
        let today = date(2024, 3, 31);
        let window = report_window(Some("2024-03-20"), None, today, 30).unwrap();
        assert_eq!(window.start, date(2024, 3, 20));
        assert_eq!(window.end, today);
    }

    #[test]
    fn test_report_window_inverted() {
        let today = date(2024, 3, 31);
        let err = report_window(Some("2024-03-10"), Some("2024-03-01"), today, 30).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedRange { .. }));
        assert_eq!(err.field(), "date");
    }

    #[test]
    fn test_report_window_default_start_before_min_date() {
        let today = date(2024, 3, 31);
        let err = report_window(None, Some("-262143-01-05"), today, 30).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDate(_)));
        assert_eq!(err.field(), "date");
    }

    #[test]
    fn test_report_window_length_limit() {
        let today = date(2024, 3, 31);
        let end = date(2024, 1, 1);
        let start = end - Duration::days(MAX_REPORT_WINDOW_DAYS);
        let raw_start = start.to_string();
        let window = report_window(Some(raw_start.as_str()), Some("2024-01-01"), today, 30).unwrap();
        assert_eq!(window.start, start);

        let err = report_window(Some("0001-01-01"), Some("2024-01-01"), today, 30).unwrap_err();
        assert!(matches!(err, ValidationError::WindowTooLong { .. }));
        assert_eq!(err.field(), "date");
    }

    // ========================================================================
    // Configuration Validation Tests
    // ========================================================================

    #[test]
    fn test_change_reason_length() {
        assert_eq!(validate_change_reason("  restock policy  "), Ok("restock policy".to_string()));
        assert_eq!(validate_change_reason("abcde"), Ok("abcde".to_string()));
        assert_eq!(validate_change_reason("  abc  "), Err(ValidationError::ReasonTooShort));
        assert_eq!(validate_change_reason(""), Err(ValidationError::ReasonTooShort));
    }

    #[test]
    fn test_daily_consumption_rate_range() {
        assert!(validate_daily_consumption_rate(Decimal::new(1, 1)).is_ok());
        assert!(validate_daily_consumption_rate(Decimal::ONE_HUNDRED).is_ok());
        assert!(validate_daily_consumption_rate(Decimal::ZERO).is_err());
        assert!(validate_daily_consumption_rate(Decimal::new(1001, 1)).is_err());
    }

    #[test]
    fn test_safety_factor_range() {
        assert!(validate_safety_factor(Decimal::new(5, 1)).is_ok());
        assert!(validate_safety_factor(Decimal::TEN).is_ok());
        assert!(validate_safety_factor(Decimal::new(4, 1)).is_err());
        assert!(validate_safety_factor(Decimal::new(101, 1)).is_err());
    }

    #[test]
    fn test_ratio_percent_range() {
        assert!(validate_ratio_percent(Decimal::ZERO).is_ok());
        assert!(validate_ratio_percent(Decimal::ONE_HUNDRED).is_ok());
        assert!(validate_ratio_percent(Decimal::NEGATIVE_ONE).is_err());
        assert!(validate_ratio_percent(Decimal::from(101)).is_err());
    }

    #[test]
    fn test_scope_pairing() {
        assert!(validate_scope(None, None).is_ok());
        assert!(validate_scope(Some(BloodType::A), Some(1)).is_ok());
        assert_eq!(validate_scope(Some(BloodType::A), None), Err(ValidationError::HalfScoped));
        assert_eq!(validate_scope(None, Some(1)), Err(ValidationError::HalfScoped));
    }

    // ========================================================================
    // Stock Validation Tests
    // ========================================================================

    #[test]
    fn test_threshold_non_negative() {
        assert!(validate_threshold(0, 0).is_ok());
        assert!(validate_threshold(10, 5).is_ok());
        assert_eq!(
            validate_threshold(-1, 5),
            Err(ValidationError::Negative("safety_qty"))
        );
        assert_eq!(
            validate_threshold(10, -5),
            Err(ValidationError::Negative("alert_threshold"))
        );
    }
}
