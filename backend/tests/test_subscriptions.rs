//! Integration tests for per-facility reservation handling.

use parking_monitor_core_rs::oracle::mock::MockSimulationOracle;
use parking_monitor_core_rs::{
    FacilityDef, MonitorConfig, MonitorError, ParkingMonitor,
};
use std::collections::{BTreeMap, BTreeSet};

fn monitor() -> ParkingMonitor<MockSimulationOracle> {
    let mut oracle = MockSimulationOracle::new();
    oracle.add_facility("pa_1", 10, 0);

    let classes: BTreeSet<String> = ["car".to_string(), "truck".to_string()].into();
    ParkingMonitor::new(
        MonitorConfig::new(42, classes),
        vec![FacilityDef {
            id: "pa_1".to_string(),
            lane: "edge1_0".to_string(),
            end_pos: 20.0,
        }],
        vec![],
        oracle,
    )
    .unwrap()
}

fn capacities() -> BTreeMap<String, i64> {
    [("car".to_string(), 8), ("truck".to_string(), 2)].into()
}

#[test]
fn test_subscriptions_before_capacity_not_configured() {
    let mut monitor = monitor();
    let result = monitor.set_subscriptions_by_class(
        "pa_1",
        [("car".to_string(), 1), ("truck".to_string(), 0)].into(),
    );
    assert!(matches!(result, Err(MonitorError::NotConfigured(_))));
}

#[test]
fn test_subscription_setter_validates_counts() {
    let mut monitor = monitor();
    monitor.set_capacity_by_class("pa_1", capacities()).unwrap();

    // truck reserve exceeds truck capacity
    let result = monitor.set_subscriptions_by_class(
        "pa_1",
        [("car".to_string(), 1), ("truck".to_string(), 3)].into(),
    );
    assert!(matches!(result, Err(MonitorError::InvariantViolation(_))));
    // failed set leaves no partial state behind
    assert!(monitor.subscriptions_by_class("pa_1").unwrap().is_empty());

    monitor
        .set_subscriptions_by_class(
            "pa_1",
            [("car".to_string(), 2), ("truck".to_string(), 1)].into(),
        )
        .unwrap();
    let subscriptions = monitor.subscriptions_by_class("pa_1").unwrap();
    assert_eq!(subscriptions["car"].reserved(), 2);
    assert!(subscriptions["car"].vehicles().is_empty());
}

#[test]
fn test_subscribe_until_full() {
    let mut monitor = monitor();
    monitor.set_capacity_by_class("pa_1", capacities()).unwrap();
    monitor
        .set_subscriptions_by_class(
            "pa_1",
            [("car".to_string(), 2), ("truck".to_string(), 0)].into(),
        )
        .unwrap();

    assert!(monitor
        .subscribe_vehicle_to_facility("pa_1", "car", "v1")
        .unwrap());
    assert!(monitor
        .subscribe_vehicle_to_facility("pa_1", "car", "v2")
        .unwrap());
    // reservation full: refused, nothing added
    assert!(!monitor
        .subscribe_vehicle_to_facility("pa_1", "car", "v3")
        .unwrap());
    // already subscribed: refused
    assert!(!monitor
        .subscribe_vehicle_to_facility("pa_1", "car", "v1")
        .unwrap());
    // a class with zero reserved places can never accept
    assert!(!monitor
        .subscribe_vehicle_to_facility("pa_1", "truck", "t1")
        .unwrap());

    let subscriptions = monitor.subscriptions_by_class("pa_1").unwrap();
    assert_eq!(subscriptions["car"].vehicles().len(), 2);
    assert_eq!(subscriptions["car"].unfilled(), 0);
}

#[test]
fn test_unsubscribe_semantics() {
    let mut monitor = monitor();
    monitor.set_capacity_by_class("pa_1", capacities()).unwrap();
    monitor
        .set_subscriptions_by_class(
            "pa_1",
            [("car".to_string(), 2), ("truck".to_string(), 0)].into(),
        )
        .unwrap();

    assert!(monitor
        .subscribe_vehicle_to_facility("pa_1", "car", "v1")
        .unwrap());

    // absent vehicle: false
    assert!(!monitor
        .unsubscribe_vehicle_from_facility("pa_1", "car", "ghost")
        .unwrap());
    // present vehicle: removed, true
    assert!(monitor
        .unsubscribe_vehicle_from_facility("pa_1", "car", "v1")
        .unwrap());
    assert!(!monitor
        .unsubscribe_vehicle_from_facility("pa_1", "car", "v1")
        .unwrap());

    // freed place can be taken again
    assert!(monitor
        .subscribe_vehicle_to_facility("pa_1", "car", "v9")
        .unwrap());
}

#[test]
fn test_undeclared_class_not_configured() {
    let mut monitor = monitor();
    monitor.set_capacity_by_class("pa_1", capacities()).unwrap();
    monitor
        .set_subscriptions_by_class(
            "pa_1",
            [("car".to_string(), 2), ("truck".to_string(), 0)].into(),
        )
        .unwrap();

    assert!(matches!(
        monitor.subscribe_vehicle_to_facility("pa_1", "bicycle", "v1"),
        Err(MonitorError::NotConfigured(_))
    ));
    assert!(matches!(
        monitor.unsubscribe_vehicle_from_facility("pa_1", "bicycle", "v1"),
        Err(MonitorError::NotConfigured(_))
    ));
}

#[test]
fn test_unknown_facility_not_found() {
    let mut monitor = monitor();
    assert!(matches!(
        monitor.subscribe_vehicle_to_facility("pa_9", "car", "v1"),
        Err(MonitorError::NotFound(_))
    ));
    assert!(matches!(
        monitor.subscriptions_by_class("pa_9"),
        Err(MonitorError::NotFound(_))
    ));
    assert!(matches!(
        monitor.set_capacity_by_class("pa_9", capacities()),
        Err(MonitorError::NotFound(_))
    ));
}
