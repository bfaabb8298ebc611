//! Scripted oracles for testing.
//!
//! `MockSimulationOracle` holds the event lists and counters a test wants
//! the engine to see for the current step; the test mutates it between
//! `step()` calls (via `ParkingMonitor::oracle_mut`) and calls
//! [`MockSimulationOracle::advance`] to clear the per-step lists.
//! `MockRoutingOracle` answers routing queries from a fixed table and
//! counts every query it receives.

use super::{OracleError, Route, RoutingOracle, SimulationOracle, VehicleSnapshot};
use crate::models::StopRecord;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Scripted simulation oracle.
#[derive(Debug, Clone, Default)]
pub struct MockSimulationOracle {
    /// Current step, advanced by the test
    pub step: usize,
    /// Capacity counter per facility
    pub capacities: HashMap<String, i64>,
    /// Occupancy counter per facility, mutated by the test as vehicles
    /// park and leave
    pub occupancies: HashMap<String, i64>,
    /// Vehicle class per vehicle
    pub vehicle_classes: HashMap<String, String>,
    /// Stop plan reported at departure
    pub initial_stops: HashMap<String, Vec<StopRecord>>,
    /// Passengers reported at departure
    pub initial_passengers: HashMap<String, Vec<String>>,
    /// This step's departures
    pub departed: Vec<String>,
    /// This step's arrivals
    pub arrived: Vec<String>,
    /// This step's per-vehicle snapshots
    pub snapshots: BTreeMap<String, VehicleSnapshot>,
    /// This step's starting-stop list
    pub starting: Vec<String>,
    /// This step's ending-stop list (already lagged by the test script)
    pub ending: Vec<String>,
    /// Vehicles currently subscribed by the engine
    pub subscribed: BTreeSet<String>,
    /// Make `unsubscribe_vehicle` fail (to exercise the failure path)
    pub fail_unsubscribe: bool,
}

impl MockSimulationOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a facility with its capacity and initial occupancy.
    pub fn add_facility(&mut self, id: &str, capacity: i64, occupancy: i64) {
        self.capacities.insert(id.to_string(), capacity);
        self.occupancies.insert(id.to_string(), occupancy);
    }

    /// Register a vehicle's static attributes.
    pub fn add_vehicle(&mut self, id: &str, vclass: &str, stops: Vec<StopRecord>) {
        self.vehicle_classes
            .insert(id.to_string(), vclass.to_string());
        self.initial_stops.insert(id.to_string(), stops);
    }

    /// Move to the next step, clearing the per-step event lists. The
    /// snapshot map is kept: a subscribed vehicle keeps reporting its last
    /// state until the test changes it.
    pub fn advance(&mut self) {
        self.step += 1;
        self.departed.clear();
        self.arrived.clear();
        self.starting.clear();
        self.ending.clear();
    }
}

impl SimulationOracle for MockSimulationOracle {
    fn current_step(&self) -> usize {
        self.step
    }

    fn facility_capacity(&self, facility: &str) -> Result<i64, OracleError> {
        self.capacities
            .get(facility)
            .copied()
            .ok_or_else(|| OracleError::Request(format!("unknown facility {}", facility)))
    }

    fn facility_occupancy(&self, facility: &str) -> Result<i64, OracleError> {
        self.occupancies
            .get(facility)
            .copied()
            .ok_or_else(|| OracleError::Request(format!("unknown facility {}", facility)))
    }

    fn departed_vehicles(&self) -> Vec<String> {
        self.departed.clone()
    }

    fn arrived_vehicles(&self) -> Vec<String> {
        self.arrived.clone()
    }

    fn vehicle_class(&self, vehicle: &str) -> Result<String, OracleError> {
        self.vehicle_classes
            .get(vehicle)
            .cloned()
            .ok_or_else(|| OracleError::Request(format!("unknown vehicle {}", vehicle)))
    }

    fn vehicle_next_stops(&self, vehicle: &str) -> Vec<StopRecord> {
        self.initial_stops.get(vehicle).cloned().unwrap_or_default()
    }

    fn vehicle_passengers(&self, vehicle: &str) -> Vec<String> {
        self.initial_passengers
            .get(vehicle)
            .cloned()
            .unwrap_or_default()
    }

    fn subscribe_vehicle(&mut self, vehicle: &str) -> Result<(), OracleError> {
        self.subscribed.insert(vehicle.to_string());
        Ok(())
    }

    fn unsubscribe_vehicle(&mut self, vehicle: &str) -> Result<(), OracleError> {
        if self.fail_unsubscribe {
            return Err(OracleError::Request(format!(
                "unsubscription failed for {}",
                vehicle
            )));
        }
        self.subscribed.remove(vehicle);
        self.snapshots.remove(vehicle);
        Ok(())
    }

    fn vehicle_snapshots(&self) -> BTreeMap<String, VehicleSnapshot> {
        self.snapshots
            .iter()
            .filter(|(vehicle, _)| self.subscribed.contains(*vehicle))
            .map(|(vehicle, snapshot)| (vehicle.clone(), snapshot.clone()))
            .collect()
    }

    fn parking_starting_vehicles(&self) -> Vec<String> {
        self.starting.clone()
    }

    fn parking_ending_vehicles(&self) -> Vec<String> {
        self.ending.clone()
    }
}

/// Scripted routing oracle with a query counter.
#[derive(Debug, Default)]
pub struct MockRoutingOracle {
    /// (from, to) → route
    pub routes: HashMap<(String, String), Route>,
    /// (from, to) pairs that fail with an error
    pub unroutable: BTreeSet<(String, String)>,
    /// Every query received, in order
    pub queries: RefCell<Vec<(String, String)>>,
}

impl MockRoutingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a route between two edges.
    pub fn add_route(&mut self, from: &str, to: &str, travel_time: f64) {
        self.routes.insert(
            (from.to_string(), to.to_string()),
            Route {
                edges: vec![from.to_string(), to.to_string()],
                travel_time,
            },
        );
    }

    /// Script a routing failure between two edges.
    pub fn add_unroutable(&mut self, from: &str, to: &str) {
        self.unroutable
            .insert((from.to_string(), to.to_string()));
    }

    /// Number of queries received so far.
    pub fn query_count(&self) -> usize {
        self.queries.borrow().len()
    }
}

impl RoutingOracle for MockRoutingOracle {
    fn find_route(
        &self,
        from_edge: &str,
        to_edge: &str,
        _vehicle_type: &str,
    ) -> Result<Route, OracleError> {
        self.queries
            .borrow_mut()
            .push((from_edge.to_string(), to_edge.to_string()));

        let key = (from_edge.to_string(), to_edge.to_string());
        if self.unroutable.contains(&key) {
            return Err(OracleError::Request(format!(
                "no route from {} to {}",
                from_edge, to_edge
            )));
        }
        Ok(self.routes.get(&key).cloned().unwrap_or(Route {
            edges: vec![],
            travel_time: 0.0,
        }))
    }
}
