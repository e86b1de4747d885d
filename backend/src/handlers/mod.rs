//! HTTP handlers for the Blood Bank Management System

pub mod analytics;
pub mod catalog;
pub mod config;
pub mod danger_alert;
pub mod health;
pub mod inbound;
pub mod inventory;

pub use analytics::*;
pub use catalog::*;
pub use config::*;
pub use danger_alert::*;
pub use health::*;
pub use inbound::*;
pub use inventory::*;

use validator::Validate;

use crate::error::{AppError, AppResult};

/// Run derive-based request validation
pub(crate) fn validate_input<T: Validate>(input: &T) -> AppResult<()> {
    input
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))
}
