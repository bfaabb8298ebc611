//! Monitor configuration
//!
//! Everything the engine needs at initialization travels in one
//! serde-deserializable structure: the class set facilities account for,
//! the facility blacklist, declarative configuration rules, per-facility
//! overrides, and the vehicle-subscription policy. Connection handling and
//! log routing belong to the driver and have no place here.

use crate::rules::{GenericRule, UncertaintyExpr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

fn default_excluded_classes() -> BTreeSet<String> {
    ["bus", "rail"].iter().map(|s| s.to_string()).collect()
}

fn default_routing_vehicle_type() -> String {
    "passenger".to_string()
}

/// Which vehicles the monitor follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPolicy {
    /// Track only vehicles whose plan contains a parking stop, and stop
    /// following a vehicle once its plan empties.
    #[serde(default)]
    pub only_parkings: bool,

    /// Vehicle classes skipped entirely under `only_parkings` (long-haul
    /// classes that never use parking areas).
    #[serde(default = "default_excluded_classes")]
    pub excluded_classes: BTreeSet<String>,
}

impl Default for SubscriptionPolicy {
    fn default() -> Self {
        Self {
            only_parkings: false,
            excluded_classes: default_excluded_classes(),
        }
    }
}

/// Per-facility configuration override, applied after all generic rules.
/// Each present field fully replaces the attribute it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilityOverride {
    #[serde(default)]
    pub capacity_by_class: Option<BTreeMap<String, i64>>,

    #[serde(default)]
    pub subscriptions_by_class: Option<BTreeMap<String, i64>>,

    #[serde(default)]
    pub uncertainty: Option<UncertaintyExpr>,
}

/// Complete monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seed for the deterministic RNG behind uncertainty draws
    pub seed: u64,

    /// Every vehicle class used in the simulation; per-class accounting
    /// covers exactly this set
    pub vehicle_classes: BTreeSet<String>,

    /// Facility ids excluded from monitoring entirely
    #[serde(default)]
    pub blacklist: HashSet<String>,

    /// Generic rules, applied in declaration order to every matching
    /// facility
    #[serde(default)]
    pub generic_rules: Vec<GenericRule>,

    /// Per-facility overrides, applied after the generic rules
    #[serde(default)]
    pub specific_overrides: HashMap<String, FacilityOverride>,

    /// Vehicle subscription policy
    #[serde(default)]
    pub subscriptions: SubscriptionPolicy,

    /// Vehicle profile used for travel-time routing queries
    #[serde(default = "default_routing_vehicle_type")]
    pub routing_vehicle_type: String,
}

impl MonitorConfig {
    /// Configuration with the given seed and class set, everything else at
    /// its default.
    pub fn new(seed: u64, vehicle_classes: BTreeSet<String>) -> Self {
        Self {
            seed,
            vehicle_classes,
            blacklist: HashSet::new(),
            generic_rules: Vec::new(),
            specific_overrides: HashMap::new(),
            subscriptions: SubscriptionPolicy::default(),
            routing_vehicle_type: default_routing_vehicle_type(),
        }
    }

    /// Basic shape checks, run before any facility is registered.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.vehicle_classes.is_empty() {
            return Err("vehicle_classes must not be empty".to_string());
        }
        if self.routing_vehicle_type.is_empty() {
            return Err("routing_vehicle_type must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let classes: BTreeSet<String> = ["passenger".to_string()].into();
        let config = MonitorConfig::new(42, classes);
        assert!(!config.subscriptions.only_parkings);
        assert!(config.subscriptions.excluded_classes.contains("bus"));
        assert_eq!(config.routing_vehicle_type, "passenger");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_class_set_rejected() {
        let config = MonitorConfig::new(42, BTreeSet::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_full_config_deserializes() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{
                "seed": 42,
                "vehicle_classes": ["passenger", "truck"],
                "blacklist": ["pa_ignored"],
                "generic_rules": [
                    {
                        "cond": [">", "total_capacity", 50],
                        "set_to": [
                            {"uncertainty": {"mu": 0.0, "sigma": ["*", "total_capacity", 0.2]}}
                        ]
                    }
                ],
                "specific_overrides": {
                    "pa_1": {"capacity_by_class": {"passenger": 8, "truck": 2}}
                },
                "subscriptions": {"only_parkings": true}
            }"#,
        )
        .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.generic_rules.len(), 1);
        assert!(config.subscriptions.only_parkings);
        assert!(config
            .specific_overrides
            .get("pa_1")
            .unwrap()
            .capacity_by_class
            .is_some());
        // omitted field falls back to its default
        assert!(config.subscriptions.excluded_classes.contains("rail"));
    }
}
