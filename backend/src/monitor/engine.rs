//! Parking monitor engine
//!
//! The engine owns all monitor state and coordinates, once per simulation
//! step:
//! - departure/arrival intake (vehicle tracking)
//! - occupancy counter mirroring
//! - parking stop reconciliation (one-step-lagged ending list first)
//! - per-vehicle plan diffs (projection maintenance)
//! - invariant validation on every facility touched
//!
//! # The step protocol
//!
//! ```text
//! For each step t:
//! 1. Register newly departed vehicles, seed projections
//! 2. Stamp arrivals
//! 3. Re-read every facility's occupancy counter
//! 4. Process LAST step's ending-stop list (oracle reports it one step
//!    late), removing vehicles from per-class occupancy
//! 5. Fetch THIS step's starting/ending lists; hold the ending list back
//!    for step t+1
//! 6. Process the fresh starting-stop list, adding vehicles to per-class
//!    occupancy
//! 7. Diff every subscribed vehicle's stop plan, moving projections
//! 8. Validate every facility touched by 4/6
//! ```
//!
//! The 4→5→6 ordering is load-bearing: a vehicle that ends one stop and
//! starts another within the same reporting window would otherwise be
//! double-counted or lost.
//!
//! # Example
//!
//! ```rust,ignore
//! use parking_monitor_core_rs::monitor::{MonitorConfig, ParkingMonitor};
//!
//! let config = MonitorConfig::new(42, vehicle_classes);
//! let mut monitor = ParkingMonitor::new(config, facility_defs, rerouter_defs, oracle)?;
//!
//! loop {
//!     driver.advance_simulation();
//!     let result = monitor.step()?;
//!     println!("step {}: {} vehicles parked", result.step, result.stops_started);
//! }
//! ```

use crate::models::{
    same_destinations, EventLog, Facility, FacilityDef, FreePlaces, FreePlacesQuery,
    InvariantError, MonitorEvent, ParkingOffer, RerouterDef, StopRecord, Subscription, Vehicle,
};
use crate::monitor::config::MonitorConfig;
use crate::oracle::{OracleError, RoutingOracle, SimulationOracle, VehicleSnapshot};
use crate::registry::FacilityRegistry;
use crate::rng::RngManager;
use crate::rules::{evaluate_condition, evaluate_number, RuleAssignment, RuleError};
use crate::tracker::VehicleTracker;
use crate::travel::TravelTimeGraph;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Monitor error taxonomy.
///
/// `InvariantViolation` and `InconsistentState` are fatal by design: both
/// mean the tracked model silently diverged from the oracle's ground
/// truth, and correcting silently would hide the divergence.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MonitorError {
    #[error("parking facility {0} does not exist")]
    NotFound(String),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("the facility travel-time graph is not initialized")]
    NotInitialized,

    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] InvariantError),

    #[error("inconsistent state at step {step}: {reason}")]
    InconsistentState { step: usize, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("rule evaluation failed: {0}")]
    Rule(#[from] RuleError),

    #[error("oracle failure: {0}")]
    Oracle(#[from] OracleError),
}

/// Result of a single reconciliation step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    /// Step number the reconciliation ran for
    pub step: usize,
    /// Vehicles newly registered
    pub registered: usize,
    /// Tracked vehicles that arrived
    pub arrivals: usize,
    /// Facilities whose occupancy counter moved
    pub occupancy_changes: usize,
    /// Parking stops started
    pub stops_started: usize,
    /// Parking stops ended
    pub stops_ended: usize,
    /// Vehicles whose stop plan changed
    pub plan_changes: usize,
}

impl StepResult {
    fn new(step: usize) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }
}

/// A rerouter with the offers active at the queried step.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRerouter {
    pub id: String,
    pub edges: Vec<String>,
    pub offers: Vec<ParkingOffer>,
}

/// The parking monitor.
///
/// Owns the facility registry, vehicle tracker, passenger set, event log,
/// RNG, and travel-time graph; talks to the simulation through the
/// [`SimulationOracle`] it was constructed with. All reads hand out
/// snapshots, so callers can never corrupt engine state through a
/// returned value.
pub struct ParkingMonitor<O: SimulationOracle> {
    config: MonitorConfig,
    oracle: O,
    registry: FacilityRegistry,
    tracker: VehicleTracker,
    /// Every passenger ever observed aboard a tracked vehicle
    passengers: BTreeSet<String>,
    rng: RngManager,
    travel: TravelTimeGraph,
    event_log: EventLog,
    /// Ending-stop list fetched last step, consumed at the start of the
    /// next step (the oracle reports endings one step late)
    pending_ending_stops: Vec<String>,
    /// Starting-stop list fetched this step (exposed for inspection)
    last_starting_stops: Vec<String>,
    /// Per-vehicle snapshots fetched this step (exposed for inspection)
    last_snapshots: BTreeMap<String, VehicleSnapshot>,
}

impl<O: SimulationOracle> ParkingMonitor<O> {
    /// Initialize the monitor.
    ///
    /// Blacklisted facility definitions are dropped before registration.
    /// Every surviving facility gets its authoritative capacity/occupancy
    /// counters from the oracle, then the generic rules (in declaration
    /// order) and the specific overrides are applied. Configuration
    /// problems — malformed expressions, splits that break an invariant —
    /// are fatal here.
    pub fn new(
        config: MonitorConfig,
        facilities: Vec<FacilityDef>,
        rerouters: Vec<RerouterDef>,
        oracle: O,
    ) -> Result<Self, MonitorError> {
        config.validate().map_err(MonitorError::InvalidConfig)?;

        let step = oracle.current_step();
        let mut registry = FacilityRegistry::new();

        for def in facilities {
            if config.blacklist.contains(&def.id) {
                continue;
            }
            let capacity = oracle.facility_capacity(&def.id)?;
            let occupancy = oracle.facility_occupancy(&def.id)?;
            let mut facility = Facility::new(
                def,
                config.vehicle_classes.clone(),
                capacity,
                occupancy,
                step,
            );
            Self::configure_facility(&mut facility, &config)?;
            registry.insert(facility);
        }

        for rerouter in rerouters {
            registry.insert_rerouter(rerouter);
        }

        let mut event_log = EventLog::new();
        event_log.log(MonitorEvent::MonitoringStarted {
            step,
            facilities: registry.len(),
            total_capacity: registry.total_capacity(),
        });

        Ok(Self {
            rng: RngManager::new(config.seed),
            config,
            oracle,
            registry,
            tracker: VehicleTracker::new(),
            passengers: BTreeSet::new(),
            travel: TravelTimeGraph::new(),
            event_log,
            pending_ending_stops: Vec::new(),
            last_starting_stops: Vec::new(),
            last_snapshots: BTreeMap::new(),
        })
    }

    /// Apply generic rules (in order) and the specific override to one
    /// facility. Every applied assignment must leave the facility valid.
    fn configure_facility(
        facility: &mut Facility,
        config: &MonitorConfig,
    ) -> Result<(), MonitorError> {
        for rule in &config.generic_rules {
            let env = facility.environment();
            if !evaluate_condition(&rule.cond, &env)? {
                continue;
            }
            for assignment in &rule.set_to {
                match assignment {
                    RuleAssignment::Uncertainty(expr) => {
                        let mu = evaluate_number(&expr.mu, &env)?;
                        let sigma = evaluate_number(&expr.sigma, &env)?;
                        facility.set_uncertainty(mu, sigma);
                    }
                    RuleAssignment::CapacityByClass(capacities) => facility
                        .set_capacity_by_class(capacities.clone())
                        .map_err(|e| MonitorError::InvalidConfig(e.to_string()))?,
                    RuleAssignment::SubscriptionsByClass(counts) => facility
                        .set_subscriptions_by_class(counts.clone())
                        .map_err(|e| MonitorError::InvalidConfig(e.to_string()))?,
                }
            }
        }

        if let Some(specific) = config.specific_overrides.get(facility.id()) {
            let env = facility.environment();
            if let Some(capacities) = &specific.capacity_by_class {
                facility
                    .set_capacity_by_class(capacities.clone())
                    .map_err(|e| MonitorError::InvalidConfig(e.to_string()))?;
            }
            if let Some(counts) = &specific.subscriptions_by_class {
                facility
                    .set_subscriptions_by_class(counts.clone())
                    .map_err(|e| MonitorError::InvalidConfig(e.to_string()))?;
            }
            if let Some(expr) = &specific.uncertainty {
                let mu = evaluate_number(&expr.mu, &env)?;
                let sigma = evaluate_number(&expr.sigma, &env)?;
                facility.set_uncertainty(mu, sigma);
            }
        }

        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Monitor configuration (read-only)
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The simulation oracle
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable access to the simulation oracle.
    ///
    /// Primarily for testing: scripted oracles are loaded with the next
    /// step's events through this.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Number of registered facilities
    pub fn num_facilities(&self) -> usize {
        self.registry.len()
    }

    /// Number of tracked vehicles (arrived ones included)
    pub fn num_vehicles(&self) -> usize {
        self.tracker.len()
    }

    /// The monitor event log
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    // ========================================================================
    // Step protocol
    // ========================================================================

    /// Run one reconciliation step against the oracle's current reports.
    pub fn step(&mut self) -> Result<StepResult, MonitorError> {
        let step = self.oracle.current_step();
        let mut result = StepResult::new(step);

        // STEP 1: DEPARTURE INTAKE
        for vehicle in self.oracle.departed_vehicles() {
            let vclass = self.oracle.vehicle_class(&vehicle)?;
            let policy = &self.config.subscriptions;
            if policy.only_parkings && policy.excluded_classes.contains(&vclass) {
                continue;
            }

            let stops: Vec<StopRecord> = self
                .oracle
                .vehicle_next_stops(&vehicle)
                .into_iter()
                .filter(|stop| stop.is_parking_area())
                .collect();
            if policy.only_parkings && stops.is_empty() {
                continue;
            }

            let passengers = self.oracle.vehicle_passengers(&vehicle);
            for passenger in &passengers {
                self.passengers.insert(passenger.clone());
            }

            self.oracle.subscribe_vehicle(&vehicle)?;

            let targets: BTreeSet<String> = stops
                .iter()
                .map(|stop| stop.stopping_place.clone())
                .collect();
            for area in &targets {
                if let Some(facility) = self.registry.get_mut(area) {
                    facility.project(&vclass, &vehicle);
                }
            }

            self.tracker.register(Vehicle::new(
                vehicle.clone(),
                vclass.clone(),
                step,
                stops,
                passengers,
            ));
            self.event_log.log(MonitorEvent::VehicleRegistered {
                step,
                vehicle,
                vclass,
            });
            result.registered += 1;
        }

        // STEP 2: ARRIVAL INTAKE
        for vehicle in self.oracle.arrived_vehicles() {
            if self.tracker.set_arrived(&vehicle, step) {
                self.event_log
                    .log(MonitorEvent::VehicleArrived { step, vehicle });
                result.arrivals += 1;
            }
        }

        // STEP 3: OCCUPANCY DELTA SCAN
        for id in self.registry.facility_ids() {
            let occupancy = self.oracle.facility_occupancy(&id)?;
            if let Some(facility) = self.registry.get_mut(&id) {
                if facility.record_occupancy(occupancy, step) {
                    self.event_log.log(MonitorEvent::OccupancyChanged {
                        step,
                        facility: id,
                        occupancy,
                    });
                    result.occupancy_changes += 1;
                }
            }
        }

        let mut touched: BTreeSet<String> = BTreeSet::new();

        // STEP 4: ENDING-STOP RECONCILIATION
        // Uses the list fetched LAST step; the oracle reports ending
        // vehicles with one step of latency.
        let ending = std::mem::take(&mut self.pending_ending_stops);
        for vehicle in ending {
            let (previous, vclass) = match self.tracker.get_ref(&vehicle) {
                Some(tracked) => (
                    tracked.previous_facility().map(str::to_string),
                    tracked.vclass().to_string(),
                ),
                None => {
                    return Err(MonitorError::InconsistentState {
                        step,
                        reason: format!(
                            "vehicle {} ended a parking stop but was never tracked",
                            vehicle
                        ),
                    })
                }
            };

            let Some(area) = previous else {
                self.event_log
                    .log(MonitorEvent::StopUnresolved { step, vehicle });
                continue;
            };

            match self.registry.get_mut(&area) {
                Some(facility) => {
                    if !facility.remove_occupant(&vclass, &vehicle) {
                        return Err(MonitorError::InconsistentState {
                            step,
                            reason: format!(
                                "vehicle {} cannot be removed from facility {}",
                                vehicle, area
                            ),
                        });
                    }
                    touched.insert(area.clone());
                    self.event_log.log(MonitorEvent::StopEnded {
                        step,
                        vehicle,
                        facility: area,
                    });
                    result.stops_ended += 1;
                }
                None => {
                    self.event_log.log(MonitorEvent::UnmonitoredFacility {
                        step,
                        vehicle,
                        facility: area,
                    });
                }
            }
        }

        // STEP 5: FRESH SUBSCRIPTION FETCH
        // The ending list fetched here is held back until next step.
        let starting = self.oracle.parking_starting_vehicles();
        self.pending_ending_stops = self.oracle.parking_ending_vehicles();
        self.last_starting_stops = starting.clone();

        // STEP 6: STARTING-STOP RECONCILIATION
        for vehicle in starting {
            let (target, vclass) = match self.tracker.get_ref(&vehicle) {
                Some(tracked) => (
                    tracked.target_facility().map(str::to_string),
                    tracked.vclass().to_string(),
                ),
                None => {
                    return Err(MonitorError::InconsistentState {
                        step,
                        reason: format!(
                            "vehicle {} started a parking stop but was never registered",
                            vehicle
                        ),
                    })
                }
            };

            let Some(area) = target else {
                self.event_log
                    .log(MonitorEvent::StopUnresolved { step, vehicle });
                continue;
            };

            match self.registry.get_mut(&area) {
                Some(facility) => {
                    if !facility.insert_occupant(&vclass, &vehicle) {
                        return Err(MonitorError::InconsistentState {
                            step,
                            reason: format!(
                                "vehicle {} of class {} cannot occupy facility {}",
                                vehicle, vclass, area
                            ),
                        });
                    }
                    touched.insert(area.clone());
                    self.event_log.log(MonitorEvent::StopStarted {
                        step,
                        vehicle,
                        facility: area,
                    });
                    result.stops_started += 1;
                }
                None => {
                    self.event_log.log(MonitorEvent::UnmonitoredFacility {
                        step,
                        vehicle,
                        facility: area,
                    });
                }
            }
        }

        // STEP 7: PER-VEHICLE SUBSCRIPTION DIFF
        let snapshots = self.oracle.vehicle_snapshots();
        for (vehicle, snapshot) in &snapshots {
            let Some(tracked) = self.tracker.get_mut(vehicle) else {
                return Err(MonitorError::InconsistentState {
                    step,
                    reason: format!("snapshot delivered for untracked vehicle {}", vehicle),
                });
            };

            // road and passengers refresh on every snapshot
            tracked.set_edge(snapshot.edge.clone());
            tracked.set_passengers(snapshot.passengers.clone());
            for passenger in &snapshot.passengers {
                self.passengers.insert(passenger.clone());
            }

            let current: Vec<StopRecord> = snapshot
                .stops
                .iter()
                .filter(|stop| stop.is_parking_area())
                .cloned()
                .collect();
            if same_destinations(tracked.stops(), &current) {
                continue;
            }

            let old_targets = tracked.targets();
            let new_targets: BTreeSet<String> = current
                .iter()
                .map(|stop| stop.stopping_place.clone())
                .collect();
            let vclass = tracked.vclass().to_string();

            let removed: Vec<String> = old_targets.difference(&new_targets).cloned().collect();
            let added: Vec<String> = new_targets.difference(&old_targets).cloned().collect();
            for area in &removed {
                if let Some(facility) = self.registry.get_mut(area) {
                    facility.unproject(&vclass, vehicle);
                }
            }
            for area in &added {
                if let Some(facility) = self.registry.get_mut(area) {
                    facility.project(&vclass, vehicle);
                }
            }

            let had_final = tracked.final_stop_arrival().is_some();
            tracked.replace_stops(current, step);
            let plan_empty = tracked.stops().is_empty();

            self.event_log.log(MonitorEvent::PlanChanged {
                step,
                vehicle: vehicle.clone(),
                added,
                removed,
            });
            result.plan_changes += 1;

            if !had_final && tracked.final_stop_arrival().is_some() {
                self.event_log.log(MonitorEvent::FinalStopArrival {
                    step,
                    vehicle: vehicle.clone(),
                });
            }

            if self.config.subscriptions.only_parkings && plan_empty {
                match self.oracle.unsubscribe_vehicle(vehicle) {
                    Ok(()) => self.event_log.log(MonitorEvent::Unsubscribed {
                        step,
                        vehicle: vehicle.clone(),
                    }),
                    Err(_) => self.event_log.log(MonitorEvent::UnsubscribeFailed {
                        step,
                        vehicle: vehicle.clone(),
                    }),
                }
            }
        }
        self.last_snapshots = snapshots;

        // STEP 8: VALIDATION
        for area in &touched {
            if let Some(facility) = self.registry.get_ref(area) {
                facility.validate()?;
            }
        }

        Ok(result)
    }

    // ========================================================================
    // Facility queries
    // ========================================================================

    /// Snapshot of a facility.
    pub fn get_facility(&self, facility: &str) -> Result<Facility, MonitorError> {
        self.registry
            .get(facility)
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))
    }

    /// Iterate over snapshots of every registered facility, in id order.
    pub fn facilities(&self) -> impl Iterator<Item = Facility> + '_ {
        self.registry.iter()
    }

    /// Lane reference of a facility.
    pub fn facility_access(&self, facility: &str) -> Result<String, MonitorError> {
        self.registry
            .get_ref(facility)
            .map(|f| f.lane().to_string())
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))
    }

    /// Per-class capacity split of a facility.
    pub fn capacity_by_class(
        &self,
        facility: &str,
    ) -> Result<BTreeMap<String, i64>, MonitorError> {
        self.registry
            .get_ref(facility)
            .map(|f| f.capacity_by_class().clone())
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))
    }

    /// Replace a facility's per-class capacity split ("set and validate").
    pub fn set_capacity_by_class(
        &mut self,
        facility: &str,
        capacities: BTreeMap<String, i64>,
    ) -> Result<(), MonitorError> {
        let entry = self
            .registry
            .get_mut(facility)
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))?;
        entry.set_capacity_by_class(capacities)?;
        Ok(())
    }

    /// Per-class reservation state of a facility.
    pub fn subscriptions_by_class(
        &self,
        facility: &str,
    ) -> Result<BTreeMap<String, Subscription>, MonitorError> {
        self.registry
            .get_ref(facility)
            .map(|f| f.subscriptions_by_class().clone())
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))
    }

    /// Replace a facility's per-class reservation counts. Requires the
    /// capacity split to be configured first.
    pub fn set_subscriptions_by_class(
        &mut self,
        facility: &str,
        counts: BTreeMap<String, i64>,
    ) -> Result<(), MonitorError> {
        let entry = self
            .registry
            .get_mut(facility)
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))?;
        entry.set_subscriptions_by_class(counts).map_err(|e| match e {
            InvariantError::SubscriptionsWithoutCapacity { .. } => {
                MonitorError::NotConfigured(e.to_string())
            }
            other => MonitorError::from(other),
        })
    }

    /// Reserve a place for a vehicle. False when the vehicle already holds
    /// a reservation or the class is fully reserved.
    pub fn subscribe_vehicle_to_facility(
        &mut self,
        facility: &str,
        class: &str,
        vehicle: &str,
    ) -> Result<bool, MonitorError> {
        let entry = self
            .registry
            .get_mut(facility)
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))?;
        entry
            .subscribe_vehicle(class, vehicle)
            .map_err(|e| MonitorError::NotConfigured(e.to_string()))
    }

    /// Release a vehicle's reservation. False when the vehicle held none.
    pub fn unsubscribe_vehicle_from_facility(
        &mut self,
        facility: &str,
        class: &str,
        vehicle: &str,
    ) -> Result<bool, MonitorError> {
        let entry = self
            .registry
            .get_mut(facility)
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))?;
        entry
            .unsubscribe_vehicle(class, vehicle)
            .map_err(|e| MonitorError::NotConfigured(e.to_string()))
    }

    /// Per-class projection sets of a facility.
    pub fn projections_by_class(
        &self,
        facility: &str,
    ) -> Result<BTreeMap<String, HashSet<String>>, MonitorError> {
        self.registry
            .get_ref(facility)
            .map(|f| f.projections_by_class().clone())
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))
    }

    /// Free places in a facility under the query's inclusion options.
    ///
    /// Takes `&mut self` because a requested uncertainty perturbation
    /// draws from the monitor's seeded RNG.
    pub fn free_places(
        &mut self,
        facility: &str,
        query: &FreePlacesQuery,
    ) -> Result<FreePlaces, MonitorError> {
        let entry = self
            .registry
            .get_ref(facility)
            .ok_or_else(|| MonitorError::NotFound(facility.to_string()))?;

        let error = if query.with_uncertainty {
            let uncertainty = entry.uncertainty();
            self.rng.normal(uncertainty.mu, uncertainty.sigma).round() as i64
        } else {
            0
        };

        Ok(entry.free_places(query, error))
    }

    // ========================================================================
    // Travel-time queries
    // ========================================================================

    /// Recompute the facility travel-time graph from scratch, querying the
    /// routing oracle for every ordered facility pair. Previously failed
    /// edge pairs are remembered and never re-queried. Returns the number
    /// of distance entries stored.
    pub fn build_travel_time_graph<R: RoutingOracle>(&mut self, routing: &R) -> usize {
        let anchors = self.registry.anchors();
        self.travel
            .rebuild(&anchors, routing, &self.config.routing_vehicle_type)
    }

    /// Up to `num` nearest facilities by travel time, ascending by cost.
    /// Fails until [`ParkingMonitor::build_travel_time_graph`] has run.
    pub fn closest_facilities(
        &self,
        facility: &str,
        num: Option<usize>,
    ) -> Result<Vec<(f64, String)>, MonitorError> {
        self.travel
            .closest(facility, num)
            .map_err(|_| MonitorError::NotInitialized)
    }

    // ========================================================================
    // Vehicle / passenger / rerouter queries
    // ========================================================================

    /// Snapshot of a tracked vehicle, or `None` if it was never tracked.
    pub fn get_vehicle(&self, vehicle: &str) -> Option<Vehicle> {
        self.tracker.get(vehicle)
    }

    /// Iterate over snapshots of every tracked vehicle, in id order.
    pub fn vehicles(&self) -> impl Iterator<Item = Vehicle> + '_ {
        self.tracker.iter()
    }

    /// Attach a caller-owned annotation to a vehicle. False if the vehicle
    /// is not tracked.
    pub fn set_vehicle_param(
        &mut self,
        vehicle: &str,
        key: &str,
        value: serde_json::Value,
    ) -> bool {
        self.tracker.set_param(vehicle, key, value)
    }

    /// Every passenger ever observed aboard a tracked vehicle.
    pub fn passengers(&self) -> Vec<String> {
        self.passengers.iter().cloned().collect()
    }

    /// Every rerouter with its offers active at the given step.
    pub fn active_rerouters(&self, step: usize) -> Vec<ActiveRerouter> {
        self.registry
            .rerouters()
            .map(|rerouter| ActiveRerouter {
                id: rerouter.id.clone(),
                edges: rerouter.edges.clone(),
                offers: rerouter.offers_at(step).to_vec(),
            })
            .collect()
    }

    /// Ids of the rerouters governing an edge.
    pub fn rerouters_on_edge(&self, edge: &str) -> Vec<String> {
        self.registry.rerouters_on_edge(edge)
    }

    // ========================================================================
    // Raw oracle snapshots (last completed step)
    // ========================================================================

    /// Per-vehicle snapshots consumed by the last step.
    pub fn last_vehicle_snapshots(&self) -> BTreeMap<String, VehicleSnapshot> {
        self.last_snapshots.clone()
    }

    /// Starting-stop list consumed by the last step.
    pub fn last_starting_stops(&self) -> Vec<String> {
        self.last_starting_stops.clone()
    }

    /// Ending-stop list held back for the next step.
    pub fn pending_ending_stops(&self) -> Vec<String> {
        self.pending_ending_stops.clone()
    }
}

impl<O: SimulationOracle> std::fmt::Debug for ParkingMonitor<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParkingMonitor")
            .field("num_facilities", &self.num_facilities())
            .field("num_vehicles", &self.num_vehicles())
            .field("num_passengers", &self.passengers.len())
            .field("event_count", &self.event_log.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::mock::MockSimulationOracle;

    fn classes() -> BTreeSet<String> {
        ["passenger".to_string(), "truck".to_string()].into()
    }

    fn defs() -> Vec<FacilityDef> {
        vec![
            FacilityDef {
                id: "pa_1".to_string(),
                lane: "edge1_0".to_string(),
                end_pos: 20.0,
            },
            FacilityDef {
                id: "pa_2".to_string(),
                lane: "edge2_0".to_string(),
                end_pos: 35.0,
            },
        ]
    }

    fn oracle() -> MockSimulationOracle {
        let mut oracle = MockSimulationOracle::new();
        oracle.add_facility("pa_1", 10, 0);
        oracle.add_facility("pa_2", 20, 3);
        oracle
    }

    #[test]
    fn test_monitor_creation() {
        let monitor = ParkingMonitor::new(
            MonitorConfig::new(42, classes()),
            defs(),
            vec![],
            oracle(),
        )
        .unwrap();

        assert_eq!(monitor.num_facilities(), 2);
        assert_eq!(monitor.num_vehicles(), 0);
        assert_eq!(monitor.event_log().len(), 1);
        assert!(matches!(
            monitor.event_log().events()[0],
            MonitorEvent::MonitoringStarted {
                facilities: 2,
                total_capacity: 30,
                ..
            }
        ));
    }

    #[test]
    fn test_blacklist_drops_facility() {
        let mut config = MonitorConfig::new(42, classes());
        config.blacklist.insert("pa_2".to_string());

        let monitor = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();
        assert_eq!(monitor.num_facilities(), 1);
        assert!(matches!(
            monitor.get_facility("pa_2"),
            Err(MonitorError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_class_set_is_invalid_config() {
        let result = ParkingMonitor::new(
            MonitorConfig::new(42, BTreeSet::new()),
            defs(),
            vec![],
            oracle(),
        );
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn test_generic_rule_applies_uncertainty() {
        let mut config = MonitorConfig::new(42, classes());
        config.generic_rules = serde_json::from_str(
            r#"[{
                "cond": [">", "total_capacity", 15],
                "set_to": [
                    {"uncertainty": {"mu": 0.0, "sigma": ["*", "total_capacity", 0.2]}}
                ]
            }]"#,
        )
        .unwrap();

        let monitor = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();

        // pa_1 has capacity 10: rule does not match
        assert_eq!(monitor.get_facility("pa_1").unwrap().uncertainty().sigma, 0.0);
        // pa_2 has capacity 20: sigma = 20 * 0.2
        assert_eq!(monitor.get_facility("pa_2").unwrap().uncertainty().sigma, 4.0);
    }

    #[test]
    fn test_invalid_rule_capacity_is_fatal_at_load() {
        let mut config = MonitorConfig::new(42, classes());
        config.generic_rules = serde_json::from_str(
            r#"[{
                "cond": ["=", 1, 1],
                "set_to": [{"capacity_by_class": {"passenger": 1, "truck": 1}}]
            }]"#,
        )
        .unwrap();

        // sums to 2, capacities are 10 and 20
        let result = ParkingMonitor::new(config, defs(), vec![], oracle());
        assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
    }

    #[test]
    fn test_specific_override_wins_over_generic_rule() {
        let mut config = MonitorConfig::new(42, classes());
        config.generic_rules = serde_json::from_str(
            r#"[{
                "cond": ["=", "id", "pa_1"],
                "set_to": [{"capacity_by_class": {"passenger": 9, "truck": 1}}]
            }]"#,
        )
        .unwrap();
        config.specific_overrides.insert(
            "pa_1".to_string(),
            serde_json::from_str(r#"{"capacity_by_class": {"passenger": 4, "truck": 6}}"#)
                .unwrap(),
        );

        let monitor = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();
        let capacities = monitor.capacity_by_class("pa_1").unwrap();
        assert_eq!(capacities.get("passenger"), Some(&4));
        assert_eq!(capacities.get("truck"), Some(&6));
    }

    #[test]
    fn test_free_places_uncertainty_is_seeded() {
        let mut config = MonitorConfig::new(7, classes());
        config.specific_overrides.insert(
            "pa_1".to_string(),
            serde_json::from_str(r#"{"uncertainty": {"mu": 0.0, "sigma": 3.0}}"#).unwrap(),
        );

        let query = FreePlacesQuery {
            with_uncertainty: true,
            ..Default::default()
        };

        let mut first = ParkingMonitor::new(config.clone(), defs(), vec![], oracle()).unwrap();
        let mut second = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();

        for _ in 0..5 {
            assert_eq!(
                first.free_places("pa_1", &query).unwrap(),
                second.free_places("pa_1", &query).unwrap()
            );
        }
    }

    #[test]
    fn test_debug_is_compact() {
        let monitor = ParkingMonitor::new(
            MonitorConfig::new(42, classes()),
            defs(),
            vec![],
            oracle(),
        )
        .unwrap();
        let rendered = format!("{:?}", monitor);
        assert!(rendered.contains("num_facilities"));
    }
}
