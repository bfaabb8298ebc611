//! Vehicle model
//!
//! Per-vehicle run-time state for every vehicle the monitor tracks: the
//! current parking stop plan, superseded plans, passengers aboard, and the
//! departure/arrival bookkeeping the step reconciler maintains.
//!
//! Vehicles are created when the oracle reports their departure and are
//! never deleted; an arrived vehicle is kept, stamped with its arrival
//! step, for later inspection.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One planned halt in a vehicle's stop plan, as reported by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    /// Lane the stop is placed on
    pub lane: String,
    /// End position of the stop along the lane
    pub end_pos: f64,
    /// Identifier of the stopping place (facility id for parking stops)
    pub stopping_place: String,
    /// Stop flag bits (see [`StopRecord::is_parking_area`])
    pub flags: u32,
    /// Planned stop duration
    pub duration: f64,
    /// Latest departure time
    pub until: f64,
}

impl StopRecord {
    /// Whether this stop halts at a parking area (implies stopped).
    ///
    /// The flags integer is defined as
    ///   1 * stopped +
    ///   2 * parking +
    ///   4 * personTriggered +
    ///   8 * containerTriggered +
    ///  16 * isBusStop +
    ///  32 * isContainerStop +
    ///  64 * chargingStation +
    /// 128 * parkingarea
    /// with each flag either 0 or 1.
    pub fn is_parking_area(&self) -> bool {
        self.flags & 128 == 128
    }
}

/// Return true iff both stop plans target the same facilities in the same
/// order. Used by the step reconciler to detect plan changes cheaply.
pub fn same_destinations(a: &[StopRecord], b: &[StopRecord]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.stopping_place == y.stopping_place)
}

/// One tracked vehicle.
///
/// The stop plan held here is already filtered to parking stops; bus
/// stops, charging stations and the like never enter the monitor. The
/// step reconciler is the only writer of the plan and membership fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    id: String,
    vclass: String,
    /// Step at which the oracle reported the departure
    departure: usize,
    /// Road/edge the vehicle was last seen on
    edge: String,
    /// Current (not yet reached) parking stops, in plan order
    stops: Vec<StopRecord>,
    /// Superseded stop plans, oldest first
    history: Vec<Vec<StopRecord>>,
    /// Passenger ids currently aboard
    passengers: HashSet<String>,
    /// Arrival step, set once the oracle reports the vehicle arrived
    arrived: Option<usize>,
    /// Step at which the stop plan first became empty
    final_stop_arrival: Option<usize>,
    /// Caller-owned annotations (see `set_param`)
    params: HashMap<String, serde_json::Value>,
}

impl Vehicle {
    /// Create a vehicle from its departure report.
    pub fn new(
        id: String,
        vclass: String,
        departure: usize,
        stops: Vec<StopRecord>,
        passengers: Vec<String>,
    ) -> Self {
        Self {
            id,
            vclass,
            departure,
            edge: String::new(),
            stops,
            history: Vec::new(),
            passengers: passengers.into_iter().collect(),
            arrived: None,
            final_stop_arrival: None,
            params: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn vclass(&self) -> &str {
        &self.vclass
    }

    pub fn departure(&self) -> usize {
        self.departure
    }

    pub fn edge(&self) -> &str {
        &self.edge
    }

    pub fn stops(&self) -> &[StopRecord] {
        &self.stops
    }

    pub fn history(&self) -> &[Vec<StopRecord>] {
        &self.history
    }

    pub fn passengers(&self) -> &HashSet<String> {
        &self.passengers
    }

    pub fn arrived(&self) -> Option<usize> {
        self.arrived
    }

    pub fn final_stop_arrival(&self) -> Option<usize> {
        self.final_stop_arrival
    }

    /// Facility ids targeted by the current stop plan.
    pub fn targets(&self) -> BTreeSet<String> {
        self.stops
            .iter()
            .map(|stop| stop.stopping_place.clone())
            .collect()
    }

    /// Facility of the stop the vehicle is currently heading to (or halted
    /// at, before the plan change lands): the head of the current plan,
    /// falling back to the head of the last superseded plan.
    pub fn target_facility(&self) -> Option<&str> {
        self.stops
            .first()
            .map(|stop| stop.stopping_place.as_str())
            .or_else(|| self.previous_facility())
    }

    /// Facility of the most recently reached stop: the head of the last
    /// superseded plan. Used to resolve ending-stop events.
    pub fn previous_facility(&self) -> Option<&str> {
        self.history
            .last()
            .and_then(|plan| plan.first())
            .map(|stop| stop.stopping_place.as_str())
    }

    pub fn set_edge(&mut self, edge: String) {
        self.edge = edge;
    }

    pub fn set_passengers(&mut self, passengers: Vec<String>) {
        self.passengers = passengers.into_iter().collect();
    }

    /// Stamp the arrival step. Later reports do not move it.
    pub fn set_arrived(&mut self, step: usize) {
        if self.arrived.is_none() {
            self.arrived = Some(step);
        }
    }

    /// Replace the current stop plan, archiving the old one.
    ///
    /// The first time the plan becomes empty the `final_stop_arrival`
    /// step is recorded; it is never moved afterwards.
    pub fn replace_stops(&mut self, stops: Vec<StopRecord>, step: usize) {
        let old = std::mem::replace(&mut self.stops, stops);
        self.history.push(old);
        if self.stops.is_empty() && self.final_stop_arrival.is_none() {
            self.final_stop_arrival = Some(step);
        }
    }

    /// Attach a caller-owned annotation to this vehicle.
    pub fn set_param(&mut self, key: String, value: serde_json::Value) {
        self.params.insert(key, value);
    }

    /// Read back a caller-owned annotation.
    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(place: &str, flags: u32) -> StopRecord {
        StopRecord {
            lane: "edge1_0".to_string(),
            end_pos: 25.0,
            stopping_place: place.to_string(),
            flags,
            duration: 0.0,
            until: 0.0,
        }
    }

    #[test]
    fn test_is_parking_area_flag() {
        assert!(stop("pa_1", 128).is_parking_area());
        assert!(stop("pa_1", 128 | 2 | 1).is_parking_area());
        assert!(!stop("bs_1", 16 | 1).is_parking_area());
    }

    #[test]
    fn test_same_destinations() {
        let a = vec![stop("pa_1", 128), stop("pa_2", 128)];
        let b = vec![stop("pa_1", 128), stop("pa_2", 128)];
        let c = vec![stop("pa_1", 128)];
        let d = vec![stop("pa_1", 128), stop("pa_3", 128)];

        assert!(same_destinations(&a, &b));
        assert!(!same_destinations(&a, &c));
        assert!(!same_destinations(&a, &d));
        assert!(same_destinations(&[], &[]));
    }

    #[test]
    fn test_replace_stops_archives_and_stamps_final() {
        let mut vehicle = Vehicle::new(
            "v1".to_string(),
            "passenger".to_string(),
            3,
            vec![stop("pa_1", 128)],
            vec![],
        );

        assert_eq!(vehicle.target_facility(), Some("pa_1"));
        assert!(vehicle.previous_facility().is_none());

        vehicle.replace_stops(vec![], 17);
        assert_eq!(vehicle.history().len(), 1);
        assert_eq!(vehicle.previous_facility(), Some("pa_1"));
        // falls back to the superseded plan once the current one is empty
        assert_eq!(vehicle.target_facility(), Some("pa_1"));
        assert_eq!(vehicle.final_stop_arrival(), Some(17));

        // a later empty plan must not move the stamp
        vehicle.replace_stops(vec![], 30);
        assert_eq!(vehicle.final_stop_arrival(), Some(17));
    }

    #[test]
    fn test_arrival_stamp_is_write_once() {
        let mut vehicle =
            Vehicle::new("v1".to_string(), "truck".to_string(), 0, vec![], vec![]);
        vehicle.set_arrived(9);
        vehicle.set_arrived(12);
        assert_eq!(vehicle.arrived(), Some(9));
    }

    #[test]
    fn test_params_roundtrip() {
        let mut vehicle =
            Vehicle::new("v1".to_string(), "truck".to_string(), 0, vec![], vec![]);
        assert!(vehicle.param("stopped").is_none());
        vehicle.set_param("stopped".to_string(), serde_json::json!(true));
        assert_eq!(vehicle.param("stopped"), Some(&serde_json::json!(true)));
    }
}
