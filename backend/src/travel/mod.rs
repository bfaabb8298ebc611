//! Facility travel-time graph
//!
//! On demand, the monitor asks the routing oracle for the travel time
//! between every ordered pair of distinct facilities and keeps, per origin,
//! the destinations ranked by cost. Rebuilding discards all previous
//! distances; edge pairs the oracle reported as unroutable stay cached
//! across rebuilds so they are never queried again.

use crate::oracle::RoutingOracle;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Errors from closest-facility queries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TravelTimeError {
    #[error("the facility travel-time graph is not initialized")]
    NotInitialized,
}

/// Ranked facility-to-facility travel times.
#[derive(Debug, Clone, Default)]
pub struct TravelTimeGraph {
    /// origin facility → (cost, destination facility), ascending by cost
    distances: Option<BTreeMap<String, Vec<(f64, String)>>>,
    /// origin edge → destination edges with no route; survives rebuilds
    unroutable: HashMap<String, HashSet<String>>,
}

impl TravelTimeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`TravelTimeGraph::rebuild`] has run at least once.
    pub fn is_initialized(&self) -> bool {
        self.distances.is_some()
    }

    /// Recompute all pairwise travel times from scratch.
    ///
    /// `anchors` are (facility id, edge, end position) triples. Pairs on
    /// the same edge where the destination is not strictly downstream of
    /// the origin are skipped as unreachable without looping. Returns the
    /// number of distance entries stored.
    pub fn rebuild<R: RoutingOracle>(
        &mut self,
        anchors: &[(String, String, f64)],
        routing: &R,
        vehicle_type: &str,
    ) -> usize {
        let mut distances: BTreeMap<String, Vec<(f64, String)>> = BTreeMap::new();
        let mut stored = 0;

        for (from_id, from_edge, from_end_pos) in anchors {
            for (to_id, to_edge, to_end_pos) in anchors {
                if from_id == to_id {
                    continue;
                }
                if from_edge == to_edge && to_end_pos <= from_end_pos {
                    // not reachable without looping
                    continue;
                }
                if self
                    .unroutable
                    .get(from_edge)
                    .is_some_and(|edges| edges.contains(to_edge))
                {
                    continue;
                }

                let route = match routing.find_route(from_edge, to_edge, vehicle_type) {
                    Ok(route) => route,
                    Err(_) => {
                        self.unroutable
                            .entry(from_edge.clone())
                            .or_default()
                            .insert(to_edge.clone());
                        continue;
                    }
                };
                if route.edges.is_empty() {
                    continue;
                }

                distances
                    .entry(from_id.clone())
                    .or_default()
                    .push((route.travel_time, to_id.clone()));
                stored += 1;
            }
        }

        for ranked in distances.values_mut() {
            // id tiebreak keeps rebuilds deterministic under equal costs
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        }

        self.distances = Some(distances);
        stored
    }

    /// Up to `num` nearest destinations from a facility, ascending by
    /// cost; all of them when `num` is `None`. A facility with no routable
    /// destination yields an empty list.
    pub fn closest(
        &self,
        facility: &str,
        num: Option<usize>,
    ) -> Result<Vec<(f64, String)>, TravelTimeError> {
        let distances = self.distances.as_ref().ok_or(TravelTimeError::NotInitialized)?;

        let ranked = match distances.get(facility) {
            Some(ranked) => ranked.as_slice(),
            None => &[],
        };
        let take = num.unwrap_or(ranked.len());
        Ok(ranked.iter().take(take).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::mock::MockRoutingOracle;

    fn anchors() -> Vec<(String, String, f64)> {
        vec![
            ("pa_1".to_string(), "edge1".to_string(), 20.0),
            ("pa_2".to_string(), "edge2".to_string(), 30.0),
            ("pa_3".to_string(), "edge3".to_string(), 10.0),
        ]
    }

    fn routing() -> MockRoutingOracle {
        let mut routing = MockRoutingOracle::new();
        routing.add_route("edge1", "edge2", 60.0);
        routing.add_route("edge1", "edge3", 25.0);
        routing.add_route("edge2", "edge1", 45.0);
        routing.add_route("edge2", "edge3", 90.0);
        routing.add_route("edge3", "edge1", 30.0);
        routing.add_route("edge3", "edge2", 15.0);
        routing
    }

    #[test]
    fn test_uninitialized_query_fails() {
        let graph = TravelTimeGraph::new();
        assert_eq!(
            graph.closest("pa_1", None),
            Err(TravelTimeError::NotInitialized)
        );
    }

    #[test]
    fn test_rebuild_ranks_by_cost() {
        let mut graph = TravelTimeGraph::new();
        let stored = graph.rebuild(&anchors(), &routing(), "passenger");
        assert_eq!(stored, 6);

        let ranked = graph.closest("pa_1", None).unwrap();
        assert_eq!(
            ranked,
            vec![(25.0, "pa_3".to_string()), (60.0, "pa_2".to_string())]
        );
    }

    #[test]
    fn test_closest_truncates() {
        let mut graph = TravelTimeGraph::new();
        graph.rebuild(&anchors(), &routing(), "passenger");

        assert_eq!(graph.closest("pa_1", Some(1)).unwrap().len(), 1);
        assert_eq!(graph.closest("pa_1", Some(10)).unwrap().len(), 2);
    }

    #[test]
    fn test_same_edge_downstream_only() {
        let anchors = vec![
            ("pa_a".to_string(), "edge1".to_string(), 50.0),
            ("pa_b".to_string(), "edge1".to_string(), 80.0),
        ];
        let mut routing = MockRoutingOracle::new();
        routing.add_route("edge1", "edge1", 5.0);

        let mut graph = TravelTimeGraph::new();
        graph.rebuild(&anchors, &routing, "passenger");

        // pa_b is downstream of pa_a: reachable
        assert_eq!(graph.closest("pa_a", None).unwrap().len(), 1);
        // pa_a is upstream of pa_b: skipped
        assert!(graph.closest("pa_b", None).unwrap().is_empty());
    }

    #[test]
    fn test_unroutable_pairs_cached_across_rebuilds() {
        let mut routing = routing();
        routing.add_unroutable("edge1", "edge3");
        routing.routes.remove(&("edge1".to_string(), "edge3".to_string()));

        let mut graph = TravelTimeGraph::new();
        graph.rebuild(&anchors(), &routing, "passenger");
        let queries_after_first = routing.query_count();

        graph.rebuild(&anchors(), &routing, "passenger");
        let queries_after_second = routing.query_count();

        // the failed pair is asked exactly once over both builds
        assert_eq!(queries_after_first, 6);
        assert_eq!(queries_after_second, queries_after_first + 5);

        let ranked = graph.closest("pa_1", None).unwrap();
        assert_eq!(ranked, vec![(60.0, "pa_2".to_string())]);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let routing = routing();
        let mut graph = TravelTimeGraph::new();

        graph.rebuild(&anchors(), &routing, "passenger");
        let first = graph.closest("pa_2", None).unwrap();

        graph.rebuild(&anchors(), &routing, "passenger");
        let second = graph.closest("pa_2", None).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_route_without_edges_is_not_blacklisted() {
        // the mock answers an empty route for unscripted pairs
        let routing = MockRoutingOracle::new();
        let mut graph = TravelTimeGraph::new();

        graph.rebuild(&anchors(), &routing, "passenger");
        assert!(graph.closest("pa_1", None).unwrap().is_empty());

        // empty routes are re-queried on the next build
        graph.rebuild(&anchors(), &routing, "passenger");
        assert_eq!(routing.query_count(), 12);
    }
}
