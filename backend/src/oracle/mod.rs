//! External collaborator contracts.
//!
//! The monitor never talks to a simulator directly: every interaction goes
//! through the [`SimulationOracle`] trait (per-step event lists, counters,
//! vehicle attribute snapshots) or the [`RoutingOracle`] trait
//! (shortest-path travel times for the facility distance graph). All calls
//! are synchronous request/response; the engine assumes exclusive access
//! between step invocations.
//!
//! The [`mock`] module provides scripted implementations. NOTE: they are
//! available in all builds to support integration testing, but should only
//! be used in test code.

use crate::models::StopRecord;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod mock;

/// Failure of an oracle request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(String),
}

/// Per-vehicle attribute snapshot delivered once per step for every
/// subscribed vehicle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleSnapshot {
    /// Road/edge the vehicle is currently on
    pub edge: String,
    /// Remaining planned stops (unfiltered; the monitor keeps only
    /// parking stops)
    pub stops: Vec<StopRecord>,
    /// Passenger ids currently aboard
    pub passengers: Vec<String>,
}

/// A route answer from the routing oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Edges along the route; empty means no usable route was found
    pub edges: Vec<String>,
    /// Travel-time cost of the route
    pub travel_time: f64,
}

/// The simulation side of the oracle: authoritative counters and per-step
/// event lists.
///
/// The ending-stop list is reported with one step of latency relative to
/// the starting-stop list; the reconciliation protocol depends on exactly
/// that contract.
pub trait SimulationOracle {
    /// Current simulation step
    fn current_step(&self) -> usize;

    /// Authoritative capacity counter of a facility (read at
    /// initialization)
    fn facility_capacity(&self, facility: &str) -> Result<i64, OracleError>;

    /// Authoritative occupancy counter of a facility (read every step)
    fn facility_occupancy(&self, facility: &str) -> Result<i64, OracleError>;

    /// Vehicles that departed this step
    fn departed_vehicles(&self) -> Vec<String>;

    /// Vehicles that arrived (left the simulation) this step
    fn arrived_vehicles(&self) -> Vec<String>;

    /// Vehicle class of a vehicle
    fn vehicle_class(&self, vehicle: &str) -> Result<String, OracleError>;

    /// Full stop plan of a vehicle (queried once, at departure)
    fn vehicle_next_stops(&self, vehicle: &str) -> Vec<StopRecord>;

    /// Passengers aboard a vehicle (queried once, at departure)
    fn vehicle_passengers(&self, vehicle: &str) -> Vec<String>;

    /// Start delivering per-step snapshots for a vehicle
    fn subscribe_vehicle(&mut self, vehicle: &str) -> Result<(), OracleError>;

    /// Stop delivering per-step snapshots for a vehicle
    fn unsubscribe_vehicle(&mut self, vehicle: &str) -> Result<(), OracleError>;

    /// This step's snapshots for all subscribed vehicles
    fn vehicle_snapshots(&self) -> BTreeMap<String, VehicleSnapshot>;

    /// Vehicles that started a parking stop this step
    fn parking_starting_vehicles(&self) -> Vec<String>;

    /// Vehicles that ended a parking stop — lagged one step behind the
    /// starting list
    fn parking_ending_vehicles(&self) -> Vec<String>;
}

/// The routing side of the oracle: shortest-path queries between edges.
pub trait RoutingOracle {
    /// Find a route between two edges for the given vehicle type.
    ///
    /// An `Err` marks the pair as unroutable; an `Ok` route with an empty
    /// edge list yields no distance entry but is not treated as
    /// unroutable.
    fn find_route(
        &self,
        from_edge: &str,
        to_edge: &str,
        vehicle_type: &str,
    ) -> Result<Route, OracleError>;
}
