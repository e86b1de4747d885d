//! Business logic services for the Blood Bank Management System

pub mod alert;
pub mod analytics;
pub mod catalog;
pub mod config;
pub mod danger_alert;
pub mod inbound;
pub mod inventory;
pub mod notification;

pub use alert::AlertService;
pub use analytics::AnalyticsService;
pub use catalog::CatalogService;
pub use config::ConfigService;
pub use danger_alert::DangerAlertService;
pub use inbound::InboundService;
pub use inventory::InventoryService;
pub use notification::NotificationService;

use shared::BloodType;

use crate::error::{AppError, AppResult};

/// Blood types are stored as text; anything else is a corrupt row
pub(crate) fn decode_blood_type(raw: &str) -> AppResult<BloodType> {
    raw.parse()
        .map_err(|e: String| AppError::Internal(format!("Corrupt blood type in database: {}", e)))
}
