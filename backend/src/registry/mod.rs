//! Facility registry
//!
//! Owns every registered facility and rerouter, plus the inverse
//! edge → rerouter mapping. Public reads hand out clones; mutable access
//! stays inside the crate so the step reconciler remains the only writer.

use crate::models::{Facility, RerouterDef};
use std::collections::{BTreeMap, HashMap};

/// Registry of facilities and rerouters.
#[derive(Debug, Clone, Default)]
pub struct FacilityRegistry {
    facilities: BTreeMap<String, Facility>,
    rerouters: BTreeMap<String, RerouterDef>,
    edge_rerouters: HashMap<String, Vec<String>>,
}

impl FacilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered facilities
    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    pub fn contains(&self, facility: &str) -> bool {
        self.facilities.contains_key(facility)
    }

    /// Register a facility. Blacklisted definitions are filtered out
    /// before this is reached.
    pub(crate) fn insert(&mut self, facility: Facility) {
        self.facilities.insert(facility.id().to_string(), facility);
    }

    /// Register a rerouter and index it by the edges it governs.
    pub(crate) fn insert_rerouter(&mut self, rerouter: RerouterDef) {
        for edge in &rerouter.edges {
            self.edge_rerouters
                .entry(edge.clone())
                .or_default()
                .push(rerouter.id.clone());
        }
        self.rerouters.insert(rerouter.id.clone(), rerouter);
    }

    /// Borrow a facility (engine read path).
    pub(crate) fn get_ref(&self, facility: &str) -> Option<&Facility> {
        self.facilities.get(facility)
    }

    /// Borrow a facility mutably (reconciler write path).
    pub(crate) fn get_mut(&mut self, facility: &str) -> Option<&mut Facility> {
        self.facilities.get_mut(facility)
    }

    /// Snapshot of a facility.
    pub fn get(&self, facility: &str) -> Option<Facility> {
        self.facilities.get(facility).cloned()
    }

    /// Ids of all registered facilities, in id order.
    pub fn facility_ids(&self) -> Vec<String> {
        self.facilities.keys().cloned().collect()
    }

    /// Iterate over snapshots of all facilities, in id order.
    pub fn iter(&self) -> impl Iterator<Item = Facility> + '_ {
        self.facilities.values().cloned()
    }

    /// Total capacity across all facilities.
    pub fn total_capacity(&self) -> i64 {
        self.facilities.values().map(Facility::total_capacity).sum()
    }

    /// (id, edge, end position) anchors for the travel-time builder.
    pub(crate) fn anchors(&self) -> Vec<(String, String, f64)> {
        self.facilities
            .values()
            .map(|f| (f.id().to_string(), f.edge().to_string(), f.end_pos()))
            .collect()
    }

    /// All registered rerouters, in id order.
    pub fn rerouters(&self) -> impl Iterator<Item = &RerouterDef> {
        self.rerouters.values()
    }

    /// Ids of the rerouters governing an edge.
    pub fn rerouters_on_edge(&self, edge: &str) -> Vec<String> {
        self.edge_rerouters.get(edge).cloned().unwrap_or_default()
    }
}
