//! Execution layer - the serialized assignment service and its periodic
//! driver.

#![warn(missing_docs)]

pub mod config;
pub mod service;
pub mod driver;

pub use config::{ConfigError, WorkforceConfig};
pub use service::{AssignmentService, BreakdownImport, ServiceError, Result};
pub use driver::{DriverConfig, PeriodicDriver, TickReport};
