//! Parking Monitor Core - Rust Engine
//!
//! Tracks the live state of parking facilities inside a running traffic
//! simulation and answers capacity queries about them, driven purely by
//! per-step events from an external simulation oracle.
//!
//! # Architecture
//!
//! - **models**: Domain types (Facility, Vehicle, Rerouter, event log)
//! - **rules**: Prefix-notation expression language for facility
//!   configuration
//! - **registry**: Facility and rerouter registry
//! - **tracker**: Per-vehicle run-time state
//! - **monitor**: Per-step reconciliation engine and configuration
//! - **travel**: Facility travel-time graph
//! - **oracle**: External collaborator contracts (simulation + routing)
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Per-class occupancy sums always match the oracle's counters
//! 2. All randomness is deterministic (seeded RNG)
//! 3. Ending-stop events are consumed one step late, before fresh lists
//!    are fetched

// Module declarations
pub mod models;
pub mod monitor;
pub mod oracle;
pub mod registry;
pub mod rng;
pub mod rules;
pub mod tracker;
pub mod travel;

// Re-exports for convenience
pub use models::{
    event::{EventLog, MonitorEvent},
    facility::{
        Facility, FacilityDef, FreePlaces, FreePlacesQuery, InvariantError, Subscription,
        SubscriptionError, Uncertainty,
    },
    rerouter::{ParkingOffer, RerouterDef, RerouterInterval},
    vehicle::{same_destinations, StopRecord, Vehicle},
};
pub use monitor::{
    ActiveRerouter, FacilityOverride, MonitorConfig, MonitorError, ParkingMonitor, StepResult,
    SubscriptionPolicy,
};
pub use oracle::{OracleError, Route, RoutingOracle, SimulationOracle, VehicleSnapshot};
pub use registry::FacilityRegistry;
pub use rng::RngManager;
pub use rules::{Expr, GenericRule, Op, RuleAssignment, RuleError, RuleValue, UncertaintyExpr};
pub use tracker::VehicleTracker;
pub use travel::{TravelTimeError, TravelTimeGraph};
