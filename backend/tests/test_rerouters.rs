//! Integration tests for rerouter interval queries.

use parking_monitor_core_rs::oracle::mock::MockSimulationOracle;
use parking_monitor_core_rs::{
    FacilityDef, MonitorConfig, ParkingMonitor, ParkingOffer, RerouterDef, RerouterInterval,
};
use std::collections::BTreeSet;

fn offer(facility: &str, visible: bool) -> ParkingOffer {
    ParkingOffer {
        facility: facility.to_string(),
        visible,
    }
}

fn monitor() -> ParkingMonitor<MockSimulationOracle> {
    let mut oracle = MockSimulationOracle::new();
    oracle.add_facility("pa_1", 10, 0);

    let rerouters = vec![
        RerouterDef {
            id: "rr_1".to_string(),
            edges: vec!["edge1".to_string(), "edge2".to_string()],
            intervals: vec![
                RerouterInterval {
                    end: 100,
                    offers: vec![offer("pa_1", true), offer("pa_2", false)],
                },
                RerouterInterval {
                    end: 200,
                    offers: vec![offer("pa_3", true)],
                },
            ],
        },
        RerouterDef {
            id: "rr_2".to_string(),
            edges: vec!["edge2".to_string()],
            intervals: vec![RerouterInterval {
                end: 50,
                offers: vec![offer("pa_1", false)],
            }],
        },
    ];

    let classes: BTreeSet<String> = ["passenger".to_string()].into();
    ParkingMonitor::new(
        MonitorConfig::new(42, classes),
        vec![FacilityDef {
            id: "pa_1".to_string(),
            lane: "edge1_0".to_string(),
            end_pos: 20.0,
        }],
        rerouters,
        oracle,
    )
    .unwrap()
}

#[test]
fn test_active_offers_per_interval() {
    let monitor = monitor();

    let active = monitor.active_rerouters(10);
    assert_eq!(active.len(), 2);

    let rr_1 = active.iter().find(|r| r.id == "rr_1").unwrap();
    assert_eq!(rr_1.offers.len(), 2);
    assert_eq!(rr_1.offers[0].facility, "pa_1");
    assert!(rr_1.offers[0].visible);
    assert!(!rr_1.offers[1].visible);
    assert_eq!(rr_1.edges, vec!["edge1".to_string(), "edge2".to_string()]);
}

#[test]
fn test_interval_switch_at_boundary() {
    let monitor = monitor();

    let at_end = monitor.active_rerouters(100);
    let rr_1 = at_end.iter().find(|r| r.id == "rr_1").unwrap();
    assert_eq!(rr_1.offers[0].facility, "pa_1");

    let after_end = monitor.active_rerouters(101);
    let rr_1 = after_end.iter().find(|r| r.id == "rr_1").unwrap();
    assert_eq!(rr_1.offers[0].facility, "pa_3");
}

#[test]
fn test_past_last_interval_keeps_final_offers() {
    let monitor = monitor();

    let late = monitor.active_rerouters(9999);
    let rr_1 = late.iter().find(|r| r.id == "rr_1").unwrap();
    assert_eq!(rr_1.offers[0].facility, "pa_3");
    let rr_2 = late.iter().find(|r| r.id == "rr_2").unwrap();
    assert_eq!(rr_2.offers[0].facility, "pa_1");
}

#[test]
fn test_edge_index() {
    let monitor = monitor();

    assert_eq!(monitor.rerouters_on_edge("edge1"), vec!["rr_1"]);
    assert_eq!(monitor.rerouters_on_edge("edge2"), vec!["rr_1", "rr_2"]);
    assert!(monitor.rerouters_on_edge("edge9").is_empty());
}
