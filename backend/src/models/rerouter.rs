//! Rerouter model
//!
//! A rerouter is a static rule set attached to a group of edges: vehicles
//! traversing one of those edges during a given time window are offered an
//! alternative list of parking facilities. The monitor only answers "which
//! offers are active at step t" — applying them to vehicles is the
//! driver's business.

use serde::{Deserialize, Serialize};

/// One facility offered by a rerouter interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingOffer {
    /// Facility id
    pub facility: String,
    /// Whether the offer is advertised to drivers that still see free
    /// places at their original destination
    pub visible: bool,
}

/// One time window of a rerouter definition, valid up to (and including)
/// `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouterInterval {
    /// Last step this interval is active
    pub end: usize,
    /// Facilities offered during the interval
    pub offers: Vec<ParkingOffer>,
}

/// Static rerouter definition, produced by the (external) definition
/// loader. Intervals are listed in declaration order, ascending by end
/// step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerouterDef {
    /// Rerouter identifier
    pub id: String,
    /// Edges this rerouter governs
    pub edges: Vec<String>,
    /// Offer windows, ascending by `end`
    pub intervals: Vec<RerouterInterval>,
}

impl RerouterDef {
    /// Offers active at the given step: the first interval whose end has
    /// not passed. A step beyond every interval keeps the last interval
    /// active rather than dropping to an empty offer list.
    pub fn offers_at(&self, step: usize) -> &[ParkingOffer] {
        for interval in &self.intervals {
            if step <= interval.end {
                return &interval.offers;
            }
        }
        self.intervals
            .last()
            .map(|interval| interval.offers.as_slice())
            .unwrap_or(&[])
    }
}
