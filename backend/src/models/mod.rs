//! Domain types: facilities, vehicles, rerouters, and the monitor event
//! log.

pub mod event;
pub mod facility;
pub mod rerouter;
pub mod vehicle;

pub use event::{EventLog, MonitorEvent};
pub use facility::{
    Facility, FacilityDef, FreePlaces, FreePlacesQuery, InvariantError, Subscription,
    SubscriptionError, Uncertainty,
};
pub use rerouter::{ParkingOffer, RerouterDef, RerouterInterval};
pub use vehicle::{same_destinations, StopRecord, Vehicle};
