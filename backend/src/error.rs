//! Error handling for the Blood Bank Management System
//!
//! Provides consistent error responses in English and Korean

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::{LedgerError, ValidationError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_ko: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger errors
    #[error("Insufficient stock for {blood_type} {preparation}: current {previous_qty}, requested out {requested_out}")]
    InsufficientStock {
        blood_type: String,
        preparation: String,
        previous_qty: i32,
        requested_out: i32,
    },

    #[error("Batch commit failed: {0}")]
    CommitFailure(String),

    // External service errors
    #[error("Notification delivery error: {0}")]
    NotificationError(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let message_ko = match &err {
            ValidationError::InvalidDate(_) => "날짜 형식이 올바르지 않습니다 (YYYY-MM-DD)",
            ValidationError::InvertedRange { .. } => "시작일이 종료일보다 늦습니다",
            ValidationError::WindowTooLong { .. } => "조회 기간이 너무 깁니다",
            ValidationError::ReasonTooShort => "변경 사유는 5자 이상이어야 합니다",
            ValidationError::OutOfRange { .. } => "허용 범위를 벗어난 값입니다",
            ValidationError::HalfScoped => "혈액형과 제제는 함께 지정해야 합니다",
            ValidationError::Negative(_) => "수량은 음수일 수 없습니다",
        };

        AppError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
            message_ko: message_ko.to_string(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock {
                previous_qty,
                requested_out,
                ..
            } => AppError::InsufficientStock {
                blood_type: String::new(),
                preparation: String::new(),
                previous_qty,
                requested_out,
            },
            LedgerError::NegativeQuantity => AppError::Validation {
                field: "qty".to_string(),
                message: err.to_string(),
                message_ko: "수량은 음수일 수 없습니다".to_string(),
            },
            LedgerError::EmptyNote => AppError::Validation {
                field: "note".to_string(),
                message: err.to_string(),
                message_ko: "비고를 입력해야 합니다".to_string(),
            },
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_ko: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message_en: impl Into<String>, message_ko: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message_en: message_en.into(),
            message_ko: message_ko.into(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), "인증되지 않았습니다"),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                    "이 작업을 수행할 권한이 없습니다",
                ),
            ),
            AppError::Validation {
                field,
                message,
                message_ko,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_ko.clone())
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new(
                    "VALIDATION_ERROR",
                    msg.clone(),
                    format!("입력값이 올바르지 않습니다: {}", msg),
                ),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{}을(를) 찾을 수 없습니다", resource),
                ),
            ),
            AppError::InsufficientStock {
                blood_type,
                preparation,
                previous_qty,
                requested_out,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    field: Some("out_qty".to_string()),
                    ..ErrorDetail::new(
                        "INSUFFICIENT_STOCK",
                        format!(
                            "Insufficient stock for {} {}: current {}, requested out {}",
                            blood_type, preparation, previous_qty, requested_out
                        ),
                        format!(
                            "재고 부족 ({} {}): 현재 {}, 출고 요청 {}",
                            blood_type, preparation, previous_qty, requested_out
                        ),
                    )
                },
            ),
            AppError::CommitFailure(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "COMMIT_FAILURE",
                    "The batch could not be saved; no item was applied. Retry the whole batch.",
                    "일괄 저장에 실패하여 어떤 항목도 반영되지 않았습니다. 전체를 다시 시도하세요.",
                ),
            ),
            AppError::NotificationError(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new(
                    "NOTIFICATION_ERROR",
                    format!("Notification delivery error: {}", msg),
                    format!("알림 전송 오류: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred",
                    "데이터베이스 오류가 발생했습니다",
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone(), "서버 내부 오류가 발생했습니다"),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred",
                    "서버 내부 오류가 발생했습니다",
                ),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
