//! Integration tests for declarative facility configuration.

use parking_monitor_core_rs::oracle::mock::MockSimulationOracle;
use parking_monitor_core_rs::{
    FacilityDef, GenericRule, MonitorConfig, MonitorError, ParkingMonitor,
};
use std::collections::BTreeSet;

fn classes() -> BTreeSet<String> {
    ["passenger".to_string(), "truck".to_string()].into()
}

fn defs() -> Vec<FacilityDef> {
    vec![
        FacilityDef {
            id: "pa_small".to_string(),
            lane: "edge1_0".to_string(),
            end_pos: 20.0,
        },
        FacilityDef {
            id: "pa_big".to_string(),
            lane: "edge2_0".to_string(),
            end_pos: 35.0,
        },
    ]
}

fn oracle() -> MockSimulationOracle {
    let mut oracle = MockSimulationOracle::new();
    oracle.add_facility("pa_small", 10, 0);
    oracle.add_facility("pa_big", 100, 0);
    oracle
}

fn rules(json: &str) -> Vec<GenericRule> {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_condition_selects_facilities() {
    let mut config = MonitorConfig::new(42, classes());
    config.generic_rules = rules(
        r#"[{
            "cond": [">", "total_capacity", 50],
            "set_to": [{"uncertainty": {"mu": 0.0, "sigma": ["*", "total_capacity", 0.2]}}]
        }]"#,
    );

    let monitor = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();

    assert_eq!(monitor.get_facility("pa_small").unwrap().uncertainty().sigma, 0.0);
    assert_eq!(monitor.get_facility("pa_big").unwrap().uncertainty().sigma, 20.0);
}

#[test]
fn test_later_rule_wins() {
    let mut config = MonitorConfig::new(42, classes());
    config.generic_rules = rules(
        r#"[
            {
                "cond": ["=", 1, 1],
                "set_to": [{"uncertainty": {"mu": 1.0, "sigma": 1.0}}]
            },
            {
                "cond": ["=", 1, 1],
                "set_to": [{"uncertainty": {"mu": 2.0, "sigma": 5.0}}]
            }
        ]"#,
    );

    let monitor = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();
    let uncertainty = monitor.get_facility("pa_small").unwrap().uncertainty();
    assert_eq!(uncertainty.mu, 2.0);
    assert_eq!(uncertainty.sigma, 5.0);
}

#[test]
fn test_rule_sets_capacity_and_subscriptions_in_order() {
    let mut config = MonitorConfig::new(42, classes());
    config.generic_rules = rules(
        r#"[{
            "cond": ["=", "id", "pa_small"],
            "set_to": [
                {"capacity_by_class": {"passenger": 7, "truck": 3}},
                {"subscriptions_by_class": {"passenger": 2, "truck": 1}}
            ]
        }]"#,
    );

    let monitor = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();

    let capacities = monitor.capacity_by_class("pa_small").unwrap();
    assert_eq!(capacities["passenger"], 7);
    let subscriptions = monitor.subscriptions_by_class("pa_small").unwrap();
    assert_eq!(subscriptions["truck"].reserved(), 1);

    // the rule named pa_small only
    assert!(monitor.capacity_by_class("pa_big").unwrap().is_empty());
}

#[test]
fn test_specific_override_fully_replaces() {
    let mut config = MonitorConfig::new(42, classes());
    config.generic_rules = rules(
        r#"[{
            "cond": ["=", 1, 1],
            "set_to": [{"uncertainty": {"mu": 9.0, "sigma": 9.0}}]
        }]"#,
    );
    config.specific_overrides.insert(
        "pa_small".to_string(),
        serde_json::from_str(r#"{"uncertainty": {"mu": 0.5, "sigma": 1.5}}"#).unwrap(),
    );

    let monitor = ParkingMonitor::new(config, defs(), vec![], oracle()).unwrap();

    let specific = monitor.get_facility("pa_small").unwrap().uncertainty();
    assert_eq!((specific.mu, specific.sigma), (0.5, 1.5));
    // facilities without an override keep the generic value
    let generic = monitor.get_facility("pa_big").unwrap().uncertainty();
    assert_eq!((generic.mu, generic.sigma), (9.0, 9.0));
}

#[test]
fn test_unknown_operator_is_fatal_at_load() {
    let mut config = MonitorConfig::new(42, classes());
    config.generic_rules = rules(
        r#"[{
            "cond": ["%%", 1, 1],
            "set_to": [{"uncertainty": {"mu": 0.0, "sigma": 0.0}}]
        }]"#,
    );

    let result = ParkingMonitor::new(config, defs(), vec![], oracle());
    assert!(matches!(result, Err(MonitorError::Rule(_))));
}

#[test]
fn test_non_boolean_condition_is_fatal_at_load() {
    let mut config = MonitorConfig::new(42, classes());
    config.generic_rules = rules(
        r#"[{
            "cond": ["+", 1, 1],
            "set_to": [{"uncertainty": {"mu": 0.0, "sigma": 0.0}}]
        }]"#,
    );

    let result = ParkingMonitor::new(config, defs(), vec![], oracle());
    assert!(matches!(result, Err(MonitorError::Rule(_))));
}

#[test]
fn test_override_violating_invariant_is_fatal_at_load() {
    let mut config = MonitorConfig::new(42, classes());
    config.specific_overrides.insert(
        "pa_small".to_string(),
        // sums to 11 against a capacity of 10
        serde_json::from_str(r#"{"capacity_by_class": {"passenger": 8, "truck": 3}}"#).unwrap(),
    );

    let result = ParkingMonitor::new(config, defs(), vec![], oracle());
    assert!(matches!(result, Err(MonitorError::InvalidConfig(_))));
}
