//! Event logging for monitor runs.
//!
//! Every significant state change the step reconciler performs is appended
//! to an in-memory event log. Events enable:
//! - Debugging (understand what the reconciler did and when)
//! - Auditing (verify the tracked model against the oracle's reports)
//! - Analysis (occupancy churn, plan-change frequency, and so on)
//!
//! The log is the monitor's observability surface; there is no textual
//! logging anywhere in the engine.

/// Monitor event capturing a state change.
///
/// All events carry the step number at which they occurred. Events are
/// logged in the order they happen within a step.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Monitor initialized and facilities registered
    MonitoringStarted {
        step: usize,
        facilities: usize,
        total_capacity: i64,
    },

    /// A departed vehicle entered tracking
    VehicleRegistered {
        step: usize,
        vehicle: String,
        vclass: String,
    },

    /// A tracked vehicle left the simulation
    VehicleArrived { step: usize, vehicle: String },

    /// A facility's authoritative occupancy counter moved
    OccupancyChanged {
        step: usize,
        facility: String,
        occupancy: i64,
    },

    /// A tracked vehicle started a parking stop
    StopStarted {
        step: usize,
        vehicle: String,
        facility: String,
    },

    /// A tracked vehicle ended a parking stop (reported one step late)
    StopEnded {
        step: usize,
        vehicle: String,
        facility: String,
    },

    /// A tracked vehicle's stop plan changed
    PlanChanged {
        step: usize,
        vehicle: String,
        added: Vec<String>,
        removed: Vec<String>,
    },

    /// A tracked vehicle's stop plan became empty for the first time
    FinalStopArrival { step: usize, vehicle: String },

    /// The monitor stopped following a vehicle's updates
    Unsubscribed { step: usize, vehicle: String },

    /// The oracle refused to drop a vehicle update stream
    UnsubscribeFailed { step: usize, vehicle: String },

    /// A stop event referenced a facility outside the registry
    UnmonitoredFacility {
        step: usize,
        vehicle: String,
        facility: String,
    },

    /// A stop event could not be mapped to any facility
    StopUnresolved { step: usize, vehicle: String },
}

impl MonitorEvent {
    /// Step at which this event occurred
    pub fn step(&self) -> usize {
        match self {
            MonitorEvent::MonitoringStarted { step, .. } => *step,
            MonitorEvent::VehicleRegistered { step, .. } => *step,
            MonitorEvent::VehicleArrived { step, .. } => *step,
            MonitorEvent::OccupancyChanged { step, .. } => *step,
            MonitorEvent::StopStarted { step, .. } => *step,
            MonitorEvent::StopEnded { step, .. } => *step,
            MonitorEvent::PlanChanged { step, .. } => *step,
            MonitorEvent::FinalStopArrival { step, .. } => *step,
            MonitorEvent::Unsubscribed { step, .. } => *step,
            MonitorEvent::UnsubscribeFailed { step, .. } => *step,
            MonitorEvent::UnmonitoredFacility { step, .. } => *step,
            MonitorEvent::StopUnresolved { step, .. } => *step,
        }
    }

    /// Short name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::MonitoringStarted { .. } => "MonitoringStarted",
            MonitorEvent::VehicleRegistered { .. } => "VehicleRegistered",
            MonitorEvent::VehicleArrived { .. } => "VehicleArrived",
            MonitorEvent::OccupancyChanged { .. } => "OccupancyChanged",
            MonitorEvent::StopStarted { .. } => "StopStarted",
            MonitorEvent::StopEnded { .. } => "StopEnded",
            MonitorEvent::PlanChanged { .. } => "PlanChanged",
            MonitorEvent::FinalStopArrival { .. } => "FinalStopArrival",
            MonitorEvent::Unsubscribed { .. } => "Unsubscribed",
            MonitorEvent::UnsubscribeFailed { .. } => "UnsubscribeFailed",
            MonitorEvent::UnmonitoredFacility { .. } => "UnmonitoredFacility",
            MonitorEvent::StopUnresolved { .. } => "StopUnresolved",
        }
    }

    /// Vehicle id if the event concerns one
    pub fn vehicle_id(&self) -> Option<&str> {
        match self {
            MonitorEvent::VehicleRegistered { vehicle, .. } => Some(vehicle),
            MonitorEvent::VehicleArrived { vehicle, .. } => Some(vehicle),
            MonitorEvent::StopStarted { vehicle, .. } => Some(vehicle),
            MonitorEvent::StopEnded { vehicle, .. } => Some(vehicle),
            MonitorEvent::PlanChanged { vehicle, .. } => Some(vehicle),
            MonitorEvent::FinalStopArrival { vehicle, .. } => Some(vehicle),
            MonitorEvent::Unsubscribed { vehicle, .. } => Some(vehicle),
            MonitorEvent::UnsubscribeFailed { vehicle, .. } => Some(vehicle),
            MonitorEvent::UnmonitoredFacility { vehicle, .. } => Some(vehicle),
            MonitorEvent::StopUnresolved { vehicle, .. } => Some(vehicle),
            _ => None,
        }
    }

    /// Facility id if the event concerns one
    pub fn facility_id(&self) -> Option<&str> {
        match self {
            MonitorEvent::OccupancyChanged { facility, .. } => Some(facility),
            MonitorEvent::StopStarted { facility, .. } => Some(facility),
            MonitorEvent::StopEnded { facility, .. } => Some(facility),
            MonitorEvent::UnmonitoredFacility { facility, .. } => Some(facility),
            _ => None,
        }
    }
}

/// Event log for storing and querying monitor events.
///
/// A simple wrapper around `Vec<MonitorEvent>` with convenience queries.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<MonitorEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an event
    pub fn log(&mut self, event: MonitorEvent) {
        self.events.push(event);
    }

    /// Number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events in log order
    pub fn events(&self) -> &[MonitorEvent] {
        &self.events
    }

    /// Events for a specific step
    pub fn events_at_step(&self, step: usize) -> Vec<&MonitorEvent> {
        self.events.iter().filter(|e| e.step() == step).collect()
    }

    /// Events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&MonitorEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Events for a specific vehicle
    pub fn events_for_vehicle(&self, vehicle: &str) -> Vec<&MonitorEvent> {
        self.events
            .iter()
            .filter(|e| e.vehicle_id() == Some(vehicle))
            .collect()
    }

    /// Events for a specific facility
    pub fn events_for_facility(&self, facility: &str) -> Vec<&MonitorEvent> {
        self.events
            .iter()
            .filter(|e| e.facility_id() == Some(facility))
            .collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
