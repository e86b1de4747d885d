//! Shared types and pure logic for the Blood Bank Management System
//!
//! Everything here is free of I/O: catalog and configuration models, the
//! parameter resolver, target arithmetic, ledger planning, alert evaluation,
//! historical reconstruction and input validation. The backend loads data,
//! calls into these modules and persists the result.

pub mod alert;
pub mod ledger;
pub mod models;
pub mod reconstruct;
pub mod resolver;
pub mod target;
pub mod validation;

pub use alert::*;
pub use ledger::*;
pub use models::*;
pub use reconstruct::*;
pub use resolver::*;
pub use target::*;
pub use validation::*;
