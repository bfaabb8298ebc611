//! Vehicle tracker
//!
//! Owns the per-vehicle run-time state. The tracker knows nothing about
//! facilities; the step reconciler is the only writer of plan and
//! membership data. Lookups hand out clones so callers cannot corrupt the
//! tracked state, and a missing vehicle is simply absent rather than an
//! error.

use crate::models::Vehicle;
use std::collections::BTreeMap;

/// Registry of every vehicle the monitor has seen depart.
#[derive(Debug, Clone, Default)]
pub struct VehicleTracker {
    vehicles: BTreeMap<String, Vehicle>,
}

impl VehicleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked vehicles (arrived ones included)
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn contains(&self, vehicle: &str) -> bool {
        self.vehicles.contains_key(vehicle)
    }

    /// Start tracking a vehicle (created from its departure report).
    pub fn register(&mut self, vehicle: Vehicle) {
        self.vehicles.insert(vehicle.id().to_string(), vehicle);
    }

    /// Snapshot of a vehicle, or `None` if it was never tracked.
    pub fn get(&self, vehicle: &str) -> Option<Vehicle> {
        self.vehicles.get(vehicle).cloned()
    }

    /// Borrow a tracked vehicle (reconciler read path).
    pub(crate) fn get_ref(&self, vehicle: &str) -> Option<&Vehicle> {
        self.vehicles.get(vehicle)
    }

    /// Borrow a tracked vehicle mutably (reconciler write path).
    pub(crate) fn get_mut(&mut self, vehicle: &str) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(vehicle)
    }

    /// Stamp a vehicle's arrival step. Returns false for untracked
    /// vehicles (arrivals of vehicles the monitor never followed are
    /// normal and ignored).
    pub fn set_arrived(&mut self, vehicle: &str, step: usize) -> bool {
        match self.vehicles.get_mut(vehicle) {
            Some(v) => {
                v.set_arrived(step);
                true
            }
            None => false,
        }
    }

    /// Attach a caller-owned annotation to a vehicle. Returns false if the
    /// vehicle is not tracked.
    pub fn set_param(&mut self, vehicle: &str, key: &str, value: serde_json::Value) -> bool {
        match self.vehicles.get_mut(vehicle) {
            Some(v) => {
                v.set_param(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Iterate over snapshots of all tracked vehicles, in id order.
    pub fn iter(&self) -> impl Iterator<Item = Vehicle> + '_ {
        self.vehicles.values().cloned()
    }
}
