//! Parking monitor: configuration and the per-step reconciliation engine.

pub mod config;
pub mod engine;

pub use config::{FacilityOverride, MonitorConfig, SubscriptionPolicy};
pub use engine::{ActiveRerouter, MonitorError, ParkingMonitor, StepResult};
