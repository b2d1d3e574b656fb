use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::feature::{FeatureConfig, FeatureConfigs};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("adapter backend unavailable: {0}")]
    Unavailable(String),
    #[error("gate {gate} does not accept {value}")]
    InvalidGateValue { gate: Gate, value: GateValue },
}

/// The rule mechanisms a feature can be opened through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Boolean,
    Actor,
    Group,
    PercentageOfActors,
    PercentageOfTime,
}

impl Gate {
    /// Name of the config field this gate writes to.
    pub fn key(&self) -> &'static str {
        match self {
            Gate::Boolean => "boolean",
            Gate::Actor => "actors",
            Gate::Group => "groups",
            Gate::PercentageOfActors => "percentage_of_actors",
            Gate::PercentageOfTime => "percentage_of_time",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// What a gate is enabled or disabled for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GateValue {
    Boolean(bool),
    Actor(String),
    Group(String),
    Percentage(u32),
}

impl fmt::Display for GateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateValue::Boolean(value) => write!(f, "boolean {value}"),
            GateValue::Actor(id) => write!(f, "actor {id}"),
            GateValue::Group(name) => write!(f, "group {name}"),
            GateValue::Percentage(p) => write!(f, "{p}%"),
        }
    }
}

/// Storage backend for feature flags.
///
/// Reads and writes both take `&self`: implementations own whatever interior
/// mutability their storage needs, so adapters can be stacked as decorators.
pub trait Adapter {
    /// Diagnostic name, carries no behaviour.
    fn name(&self) -> &str;

    /// Every feature key known to the backend.
    fn features(&self) -> Result<BTreeSet<String>, AdapterError>;

    fn get(&self, key: &str) -> Result<FeatureConfig, AdapterError>;

    /// Configs for all of `keys` in a single round trip.
    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, FeatureConfig>, AdapterError>;

    /// Configs for every known feature. Unknown keys look up as the default config.
    fn get_all(&self) -> Result<FeatureConfigs, AdapterError>;

    fn add(&self, key: &str) -> Result<bool, AdapterError>;

    fn remove(&self, key: &str) -> Result<bool, AdapterError>;

    /// Reset every gate of `key` without removing the feature.
    fn clear(&self, key: &str) -> Result<bool, AdapterError>;

    fn enable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError>;

    fn disable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError>;

    /// Config reported for a feature the backend has nothing stored for.
    fn default_config(&self) -> FeatureConfig {
        FeatureConfig::default()
    }
}

impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn features(&self) -> Result<BTreeSet<String>, AdapterError> {
        (**self).features()
    }

    fn get(&self, key: &str) -> Result<FeatureConfig, AdapterError> {
        (**self).get(key)
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, FeatureConfig>, AdapterError> {
        (**self).get_multi(keys)
    }

    fn get_all(&self) -> Result<FeatureConfigs, AdapterError> {
        (**self).get_all()
    }

    fn add(&self, key: &str) -> Result<bool, AdapterError> {
        (**self).add(key)
    }

    fn remove(&self, key: &str) -> Result<bool, AdapterError> {
        (**self).remove(key)
    }

    fn clear(&self, key: &str) -> Result<bool, AdapterError> {
        (**self).clear(key)
    }

    fn enable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        (**self).enable(key, gate, target)
    }

    fn disable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        (**self).disable(key, gate, target)
    }

    fn default_config(&self) -> FeatureConfig {
        (**self).default_config()
    }
}
