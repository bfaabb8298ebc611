//! Facility (parking area) model
//!
//! One `Facility` combines the immutable static description of a parking
//! area with the mutable run-time state the step reconciler maintains:
//! authoritative counters mirrored from the oracle, per-class occupancy
//! and projection sets, reservation bookkeeping, and the Gaussian
//! uncertainty applied to free-place queries.
//!
//! # Critical Invariants
//!
//! 1. If `capacity_by_class` is set, its key set equals the configured
//!    class set and its values sum to `total_capacity`.
//! 2. `occupancy_by_class` always covers exactly the configured class set
//!    and its set sizes sum to `total_occupancy`.
//! 3. `subscriptions_by_class` requires `capacity_by_class`, covers the
//!    same class set, and never reserves more places than a class has.
//!
//! Violations are reported, never auto-corrected: a broken sum means the
//! tracked model diverged from the oracle's ground truth.

use crate::rules::{Environment, RuleValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Invariant violations detected by the facility validators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvariantError {
    #[error("capacity classes of facility {facility} must be exactly {expected:?}, got {got:?}")]
    CapacityClassMismatch {
        facility: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("capacity sum of facility {facility} is {sum} but the oracle reports {total}")]
    CapacitySumMismatch {
        facility: String,
        sum: i64,
        total: i64,
    },

    #[error("occupancy classes of facility {facility} must be exactly {expected:?}, got {got:?}")]
    OccupancyClassMismatch {
        facility: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("occupancy of class {class} in facility {facility} is {count} of {capacity}")]
    ClassOverCapacity {
        facility: String,
        class: String,
        count: i64,
        capacity: i64,
    },

    #[error("occupancy sum of facility {facility} is {sum} but the oracle reports {total}")]
    OccupancySumMismatch {
        facility: String,
        sum: i64,
        total: i64,
    },

    #[error("subscriptions of facility {facility} cannot be set without capacity_by_class")]
    SubscriptionsWithoutCapacity { facility: String },

    #[error("subscription classes of facility {facility} must be exactly {expected:?}, got {got:?}")]
    SubscriptionClassMismatch {
        facility: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("subscriptions of class {class} in facility {facility} exceed capacity [{reserved}/{capacity}]")]
    SubscriptionOverCapacity {
        facility: String,
        class: String,
        reserved: i64,
        capacity: i64,
    },
}

/// Errors from the per-vehicle reservation operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubscriptionError {
    #[error("class {class} is not declared in the subscriptions of facility {facility}")]
    ClassNotDeclared { facility: String, class: String },
}

/// Static description of a facility, produced by the (external) definition
/// loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityDef {
    /// Facility identifier
    pub id: String,
    /// Lane the facility is attached to, `<edge>_<index>`
    pub lane: String,
    /// End position of the facility along its lane
    pub end_pos: f64,
}

impl FacilityDef {
    /// Edge anchor derived from the lane reference.
    pub fn edge(&self) -> &str {
        self.lane.split('_').next().unwrap_or(&self.lane)
    }
}

/// Gaussian perturbation applied to free-place queries.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Uncertainty {
    pub mu: f64,
    pub sigma: f64,
}

/// Reservation bookkeeping for one vehicle class: the number of places
/// held back, and the vehicles currently holding one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    reserved: i64,
    vehicles: HashSet<String>,
}

impl Subscription {
    fn new(reserved: i64) -> Self {
        Self {
            reserved,
            vehicles: HashSet::new(),
        }
    }

    /// Number of places held back for this class.
    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// Vehicles currently holding a reservation.
    pub fn vehicles(&self) -> &HashSet<String> {
        &self.vehicles
    }

    /// Reserved places not yet claimed by a vehicle.
    pub fn unfilled(&self) -> i64 {
        self.reserved - self.vehicles.len() as i64
    }
}

/// Options for a free-places query.
#[derive(Debug, Clone, Default)]
pub struct FreePlacesQuery {
    /// Apply the facility's Gaussian uncertainty
    pub with_uncertainty: bool,
    /// Restrict the answer to one vehicle class
    pub vclass: Option<String>,
    /// Count projected vehicles as occupants
    pub with_projections: bool,
    /// Count reservations as occupants
    pub with_subscriptions: bool,
}

/// Answer of a free-places query: a single count when the facility has no
/// class split (or a specific configured class was requested), the full
/// per-class mapping otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FreePlaces {
    Count(i64),
    ByClass(BTreeMap<String, i64>),
}

/// One parking area: static definition plus tracked run-time state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    def: FacilityDef,
    /// Vehicle classes this facility accounts for
    vehicle_classes: BTreeSet<String>,
    /// Authoritative capacity reported by the oracle at initialization
    total_capacity: i64,
    /// Authoritative occupancy, refreshed every step
    total_occupancy: i64,
    /// (occupancy, step) samples, appended whenever the counter moves
    occupancy_series: Vec<(i64, usize)>,
    /// Optional per-class capacity split; empty means "not split"
    capacity_by_class: BTreeMap<String, i64>,
    /// Vehicles currently inside, per class
    occupancy_by_class: BTreeMap<String, HashSet<String>>,
    /// Vehicles expected to arrive, per class
    projections_by_class: BTreeMap<String, HashSet<String>>,
    /// Reservations, per class; empty until explicitly configured
    subscriptions_by_class: BTreeMap<String, Subscription>,
    uncertainty: Uncertainty,
}

impl Facility {
    /// Create a facility from its static definition and the oracle's
    /// capacity/occupancy counters at initialization time.
    pub fn new(
        def: FacilityDef,
        vehicle_classes: BTreeSet<String>,
        total_capacity: i64,
        total_occupancy: i64,
        step: usize,
    ) -> Self {
        let occupancy_by_class = vehicle_classes
            .iter()
            .map(|class| (class.clone(), HashSet::new()))
            .collect();
        let projections_by_class = vehicle_classes
            .iter()
            .map(|class| (class.clone(), HashSet::new()))
            .collect();

        Self {
            def,
            vehicle_classes,
            total_capacity,
            total_occupancy,
            occupancy_series: vec![(total_occupancy, step)],
            capacity_by_class: BTreeMap::new(),
            occupancy_by_class,
            projections_by_class,
            subscriptions_by_class: BTreeMap::new(),
            uncertainty: Uncertainty::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn lane(&self) -> &str {
        &self.def.lane
    }

    pub fn edge(&self) -> &str {
        self.def.edge()
    }

    pub fn end_pos(&self) -> f64 {
        self.def.end_pos
    }

    pub fn vehicle_classes(&self) -> &BTreeSet<String> {
        &self.vehicle_classes
    }

    pub fn total_capacity(&self) -> i64 {
        self.total_capacity
    }

    pub fn total_occupancy(&self) -> i64 {
        self.total_occupancy
    }

    pub fn occupancy_series(&self) -> &[(i64, usize)] {
        &self.occupancy_series
    }

    pub fn capacity_by_class(&self) -> &BTreeMap<String, i64> {
        &self.capacity_by_class
    }

    pub fn occupancy_by_class(&self) -> &BTreeMap<String, HashSet<String>> {
        &self.occupancy_by_class
    }

    pub fn projections_by_class(&self) -> &BTreeMap<String, HashSet<String>> {
        &self.projections_by_class
    }

    pub fn subscriptions_by_class(&self) -> &BTreeMap<String, Subscription> {
        &self.subscriptions_by_class
    }

    pub fn uncertainty(&self) -> Uncertainty {
        self.uncertainty
    }

    pub fn set_uncertainty(&mut self, mu: f64, sigma: f64) {
        self.uncertainty = Uncertainty { mu, sigma };
    }

    /// Attribute environment for rule evaluation.
    pub fn environment(&self) -> Environment {
        let mut env = Environment::new();
        env.insert("id".to_string(), RuleValue::Text(self.def.id.clone()));
        env.insert("lane".to_string(), RuleValue::Text(self.def.lane.clone()));
        env.insert("edge".to_string(), RuleValue::Text(self.edge().to_string()));
        env.insert("end_pos".to_string(), RuleValue::Num(self.def.end_pos));
        env.insert(
            "total_capacity".to_string(),
            RuleValue::Num(self.total_capacity as f64),
        );
        env.insert(
            "total_occupancy".to_string(),
            RuleValue::Num(self.total_occupancy as f64),
        );
        env
    }

    // ========================================================================
    // Counter mirroring
    // ========================================================================

    /// Mirror the oracle's occupancy counter. Appends a sample and returns
    /// true iff the counter moved.
    pub fn record_occupancy(&mut self, occupancy: i64, step: usize) -> bool {
        if self.total_occupancy == occupancy {
            return false;
        }
        self.occupancy_series.push((occupancy, step));
        self.total_occupancy = occupancy;
        true
    }

    // ========================================================================
    // Capacity / subscription configuration ("set and validate")
    // ========================================================================

    /// Replace the per-class capacity split.
    ///
    /// The candidate mapping is validated against the configured class set
    /// and `total_capacity` before it is committed; on failure the prior
    /// state stays visible.
    pub fn set_capacity_by_class(
        &mut self,
        capacities: BTreeMap<String, i64>,
    ) -> Result<(), InvariantError> {
        self.check_capacity_map(&capacities)?;
        self.capacity_by_class = capacities;
        Ok(())
    }

    /// Replace the per-class reservation counts. Requires the capacity
    /// split to be configured first; reservation sets start empty.
    pub fn set_subscriptions_by_class(
        &mut self,
        counts: BTreeMap<String, i64>,
    ) -> Result<(), InvariantError> {
        self.check_subscription_counts(&counts)?;
        self.subscriptions_by_class = counts
            .into_iter()
            .map(|(class, reserved)| (class, Subscription::new(reserved)))
            .collect();
        Ok(())
    }

    /// Add a vehicle to a class's reservation set.
    ///
    /// Returns false, without touching state, when the vehicle already
    /// holds a reservation or the class's reserved places are all taken.
    /// The class must have been declared via
    /// [`Facility::set_subscriptions_by_class`] first.
    pub fn subscribe_vehicle(
        &mut self,
        class: &str,
        vehicle: &str,
    ) -> Result<bool, SubscriptionError> {
        let subscription = self.subscriptions_by_class.get_mut(class).ok_or_else(|| {
            SubscriptionError::ClassNotDeclared {
                facility: self.def.id.clone(),
                class: class.to_string(),
            }
        })?;

        if subscription.vehicles.contains(vehicle) {
            return Ok(false);
        }
        if (subscription.vehicles.len() as i64) >= subscription.reserved {
            // reservation full
            return Ok(false);
        }
        subscription.vehicles.insert(vehicle.to_string());
        Ok(true)
    }

    /// Remove a vehicle from a class's reservation set. Returns false when
    /// the vehicle held no reservation.
    pub fn unsubscribe_vehicle(
        &mut self,
        class: &str,
        vehicle: &str,
    ) -> Result<bool, SubscriptionError> {
        let subscription = self.subscriptions_by_class.get_mut(class).ok_or_else(|| {
            SubscriptionError::ClassNotDeclared {
                facility: self.def.id.clone(),
                class: class.to_string(),
            }
        })?;

        Ok(subscription.vehicles.remove(vehicle))
    }

    // ========================================================================
    // Occupancy / projection membership (step reconciler only)
    // ========================================================================

    /// Record a vehicle as physically inside. Returns false when the class
    /// is not part of this facility's accounting.
    pub fn insert_occupant(&mut self, class: &str, vehicle: &str) -> bool {
        match self.occupancy_by_class.get_mut(class) {
            Some(set) => {
                set.insert(vehicle.to_string());
                true
            }
            None => false,
        }
    }

    /// Remove a vehicle that ended its stop here. Returns false when the
    /// vehicle was not recorded as inside — the caller treats that as a
    /// fatal divergence from the oracle.
    pub fn remove_occupant(&mut self, class: &str, vehicle: &str) -> bool {
        match self.occupancy_by_class.get_mut(class) {
            Some(set) => set.remove(vehicle),
            None => false,
        }
    }

    /// Record a vehicle as expected to arrive. No-op for classes outside
    /// this facility's accounting.
    pub fn project(&mut self, class: &str, vehicle: &str) {
        if let Some(set) = self.projections_by_class.get_mut(class) {
            set.insert(vehicle.to_string());
        }
    }

    /// Drop an expected arrival.
    pub fn unproject(&mut self, class: &str, vehicle: &str) {
        if let Some(set) = self.projections_by_class.get_mut(class) {
            set.remove(vehicle);
        }
    }

    // ========================================================================
    // Free places
    // ========================================================================

    /// Compute free places under the query's inclusion options.
    ///
    /// `error` is the (already drawn, rounded) uncertainty perturbation;
    /// pass zero when uncertainty is not requested. Projected and
    /// subscribed vehicles are folded in by set union, so a vehicle that is
    /// simultaneously parked, projected, and subscribed is subtracted once.
    pub fn free_places(&self, query: &FreePlacesQuery, error: i64) -> FreePlaces {
        let mut occupancy: BTreeMap<String, HashSet<String>> = self.occupancy_by_class.clone();

        let mut total_projections: i64 = 0;
        if query.with_projections {
            for (class, vehicles) in &self.projections_by_class {
                total_projections += vehicles.len() as i64;
                if let Some(view) = occupancy.get_mut(class) {
                    view.extend(vehicles.iter().cloned());
                }
            }
        }

        let mut unfilled: BTreeMap<String, i64> = BTreeMap::new();
        let mut total_subscriptions: i64 = 0;
        if query.with_subscriptions {
            for (class, subscription) in &self.subscriptions_by_class {
                unfilled.insert(class.clone(), subscription.unfilled());
                total_subscriptions += subscription.reserved;
                if let Some(view) = occupancy.get_mut(class) {
                    view.extend(subscription.vehicles.iter().cloned());
                }
            }
        }

        if !self.capacity_by_class.is_empty() {
            let mut remaining = self.capacity_by_class.clone();
            for (class, capacity) in remaining.iter_mut() {
                *capacity += error;
                if let Some(view) = occupancy.get(class) {
                    *capacity -= view.len() as i64;
                }
                if query.with_subscriptions {
                    *capacity -= unfilled.get(class).copied().unwrap_or(0);
                }
            }
            if let Some(class) = &query.vclass {
                if let Some(count) = remaining.get(class) {
                    return FreePlaces::Count(*count);
                }
            }
            return FreePlaces::ByClass(remaining);
        }

        FreePlaces::Count(
            self.total_capacity - self.total_occupancy - total_projections - total_subscriptions
                + error,
        )
    }

    // ========================================================================
    // Invariant validation
    // ========================================================================

    /// Run every applicable check: capacity (when split), occupancy,
    /// subscriptions (when configured).
    pub fn validate(&self) -> Result<(), InvariantError> {
        if !self.capacity_by_class.is_empty() {
            self.check_capacity_map(&self.capacity_by_class)?;
        }
        self.validate_occupancy()?;
        if !self.subscriptions_by_class.is_empty() {
            let counts: BTreeMap<String, i64> = self
                .subscriptions_by_class
                .iter()
                .map(|(class, subscription)| (class.clone(), subscription.reserved))
                .collect();
            self.check_subscription_counts(&counts)?;
        }
        Ok(())
    }

    /// Check that per-class occupancy covers exactly the configured class
    /// set, stays within per-class capacity (when a split is configured),
    /// and sums to the oracle's `total_occupancy`.
    pub fn validate_occupancy(&self) -> Result<(), InvariantError> {
        let got: BTreeSet<String> = self.occupancy_by_class.keys().cloned().collect();
        if got != self.vehicle_classes {
            return Err(InvariantError::OccupancyClassMismatch {
                facility: self.def.id.clone(),
                expected: self.vehicle_classes.iter().cloned().collect(),
                got: got.into_iter().collect(),
            });
        }

        let mut sum: i64 = 0;
        for (class, vehicles) in &self.occupancy_by_class {
            let count = vehicles.len() as i64;
            if let Some(&capacity) = self.capacity_by_class.get(class) {
                if count > capacity {
                    return Err(InvariantError::ClassOverCapacity {
                        facility: self.def.id.clone(),
                        class: class.clone(),
                        count,
                        capacity,
                    });
                }
            }
            sum += count;
        }
        if sum != self.total_occupancy {
            return Err(InvariantError::OccupancySumMismatch {
                facility: self.def.id.clone(),
                sum,
                total: self.total_occupancy,
            });
        }
        Ok(())
    }

    fn check_capacity_map(&self, capacities: &BTreeMap<String, i64>) -> Result<(), InvariantError> {
        let got: BTreeSet<String> = capacities.keys().cloned().collect();
        if got != self.vehicle_classes {
            return Err(InvariantError::CapacityClassMismatch {
                facility: self.def.id.clone(),
                expected: self.vehicle_classes.iter().cloned().collect(),
                got: got.into_iter().collect(),
            });
        }
        let sum: i64 = capacities.values().sum();
        if sum != self.total_capacity {
            return Err(InvariantError::CapacitySumMismatch {
                facility: self.def.id.clone(),
                sum,
                total: self.total_capacity,
            });
        }
        Ok(())
    }

    fn check_subscription_counts(
        &self,
        counts: &BTreeMap<String, i64>,
    ) -> Result<(), InvariantError> {
        if self.capacity_by_class.is_empty() {
            return Err(InvariantError::SubscriptionsWithoutCapacity {
                facility: self.def.id.clone(),
            });
        }
        let got: BTreeSet<String> = counts.keys().cloned().collect();
        if got != self.vehicle_classes {
            return Err(InvariantError::SubscriptionClassMismatch {
                facility: self.def.id.clone(),
                expected: self.vehicle_classes.iter().cloned().collect(),
                got: got.into_iter().collect(),
            });
        }
        for (class, &reserved) in counts {
            let capacity = self.capacity_by_class.get(class).copied().unwrap_or(0);
            if reserved > capacity {
                return Err(InvariantError::SubscriptionOverCapacity {
                    facility: self.def.id.clone(),
                    class: class.clone(),
                    reserved,
                    capacity,
                });
            }
        }
        Ok(())
    }
}
