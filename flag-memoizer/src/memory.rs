use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::adapter::{Adapter, AdapterError, Gate, GateValue};
use crate::feature::{FeatureConfig, FeatureConfigs};

pub const MEMORY_ADAPTER_NAME: &str = "memory";

#[derive(Debug, Default)]
struct Source {
    features: BTreeSet<String>,
    configs: HashMap<String, FeatureConfig>,
}

/// In-process adapter keeping every feature in a map.
///
/// The set of added features and their gate configs are tracked separately:
/// a gate can be enabled on a feature that was never added, it just will not
/// show up in `features` or `get_all` until it is.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    source: Mutex<Source>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let source = Source {
            features: keys.into_iter().map(Into::into).collect(),
            configs: HashMap::new(),
        };
        Self {
            source: Mutex::new(source),
        }
    }

    // Helper method to safely lock the source
    fn lock_source(&self) -> MutexGuard<'_, Source> {
        match self.source.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn mismatch(gate: Gate, target: &GateValue) -> AdapterError {
    AdapterError::InvalidGateValue {
        gate,
        value: target.clone(),
    }
}

fn validate_percentage(gate: Gate, target: &GateValue) -> Result<u32, AdapterError> {
    match target {
        GateValue::Percentage(p) if *p <= 100 => Ok(*p),
        _ => Err(mismatch(gate, target)),
    }
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        MEMORY_ADAPTER_NAME
    }

    fn features(&self) -> Result<BTreeSet<String>, AdapterError> {
        Ok(self.lock_source().features.clone())
    }

    fn get(&self, key: &str) -> Result<FeatureConfig, AdapterError> {
        Ok(self
            .lock_source()
            .configs
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.default_config()))
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, FeatureConfig>, AdapterError> {
        let source = self.lock_source();
        Ok(keys
            .iter()
            .map(|key| {
                let config = source
                    .configs
                    .get(*key)
                    .cloned()
                    .unwrap_or_else(|| self.default_config());
                (key.to_string(), config)
            })
            .collect())
    }

    fn get_all(&self) -> Result<FeatureConfigs, AdapterError> {
        let source = self.lock_source();
        let configs = source
            .features
            .iter()
            .map(|key| {
                let config = source
                    .configs
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| self.default_config());
                (key.clone(), config)
            })
            .collect();
        Ok(FeatureConfigs::with_default(configs, self.default_config()))
    }

    fn add(&self, key: &str) -> Result<bool, AdapterError> {
        self.lock_source().features.insert(key.to_owned());
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool, AdapterError> {
        let mut source = self.lock_source();
        source.features.remove(key);
        source.configs.remove(key);
        Ok(true)
    }

    fn clear(&self, key: &str) -> Result<bool, AdapterError> {
        self.lock_source().configs.remove(key);
        Ok(true)
    }

    fn enable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        let mut source = self.lock_source();

        match (gate, target) {
            // Fully on overrides every other gate.
            (Gate::Boolean, GateValue::Boolean(_)) => {
                let config = FeatureConfig {
                    boolean: Some(true),
                    ..FeatureConfig::default()
                };
                source.configs.insert(key.to_owned(), config);
            }
            (Gate::Actor, GateValue::Actor(id)) => {
                let config = source.configs.entry(key.to_owned()).or_default();
                config.actors.insert(id.clone());
            }
            (Gate::Group, GateValue::Group(name)) => {
                let config = source.configs.entry(key.to_owned()).or_default();
                config.groups.insert(name.clone());
            }
            (Gate::PercentageOfActors, _) => {
                let percentage = validate_percentage(gate, target)?;
                let config = source.configs.entry(key.to_owned()).or_default();
                config.percentage_of_actors = Some(percentage);
            }
            (Gate::PercentageOfTime, _) => {
                let percentage = validate_percentage(gate, target)?;
                let config = source.configs.entry(key.to_owned()).or_default();
                config.percentage_of_time = Some(percentage);
            }
            _ => return Err(mismatch(gate, target)),
        }
        Ok(true)
    }

    fn disable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        let mut source = self.lock_source();

        match (gate, target) {
            (Gate::Boolean, GateValue::Boolean(_)) => {
                source.configs.remove(key);
            }
            (Gate::Actor, GateValue::Actor(id)) => {
                if let Some(config) = source.configs.get_mut(key) {
                    config.actors.remove(id);
                }
            }
            (Gate::Group, GateValue::Group(name)) => {
                if let Some(config) = source.configs.get_mut(key) {
                    config.groups.remove(name);
                }
            }
            (Gate::PercentageOfActors, _) => {
                validate_percentage(gate, target)?;
                let config = source.configs.entry(key.to_owned()).or_default();
                config.percentage_of_actors = Some(0);
            }
            (Gate::PercentageOfTime, _) => {
                validate_percentage(gate, target)?;
                let config = source.configs.entry(key.to_owned()).or_default();
                config.percentage_of_time = Some(0);
            }
            _ => return Err(mismatch(gate, target)),
        }
        Ok(true)
    }
}
