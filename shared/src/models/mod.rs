//! Domain models for the Blood Bank Management System

mod catalog;
mod config;
mod stock;

pub use catalog::*;
pub use config::*;
pub use stock::*;
