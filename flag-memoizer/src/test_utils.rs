use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::adapter::{Adapter, AdapterError, Gate, GateValue};
use crate::feature::{FeatureConfig, FeatureConfigs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAdapterCall {
    pub op: String,
    pub keys: Vec<String>,
}

#[derive(Default)]
struct MockState {
    features: BTreeMap<String, FeatureConfig>,
    failures: HashMap<String, AdapterError>,
    omitted_from_get_multi: HashSet<String>,
    calls: Vec<MockAdapterCall>,
}

/// Adapter double that records every call it receives.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the calls through another. Only the boolean gate changes the
/// stored config; other gates are acknowledged and ignored.
#[derive(Clone, Default)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    // Helper method to safely lock the mock state
    fn lock_state(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_feature(self, key: &str, config: FeatureConfig) -> Self {
        self.lock_state().features.insert(key.to_owned(), config);
        self
    }

    /// Make every subsequent `op` call fail with `err`.
    pub fn fail_with(&self, op: &str, err: AdapterError) {
        self.lock_state().failures.insert(op.to_owned(), err);
    }

    pub fn recover(&self, op: &str) {
        self.lock_state().failures.remove(op);
    }

    /// Leave `key` out of `get_multi` responses, like a backend that only
    /// answers for what it has stored.
    pub fn omit_from_get_multi(self, key: &str) -> Self {
        self.lock_state()
            .omitted_from_get_multi
            .insert(key.to_owned());
        self
    }

    pub fn get_calls(&self) -> Vec<MockAdapterCall> {
        self.lock_state().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.lock_state()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .count()
    }

    /// Keys requested by each `get_multi` call, in call order.
    pub fn get_multi_requests(&self) -> Vec<Vec<String>> {
        self.lock_state()
            .calls
            .iter()
            .filter(|call| call.op == "get_multi")
            .map(|call| call.keys.clone())
            .collect()
    }

    pub fn reset_calls(&self) {
        self.lock_state().calls.clear();
    }

    fn record(&self, op: &str, keys: &[&str]) -> Result<MutexGuard<'_, MockState>, AdapterError> {
        let mut state = self.lock_state();
        state.calls.push(MockAdapterCall {
            op: op.to_string(),
            keys: keys.iter().map(|key| key.to_string()).collect(),
        });

        if let Some(err) = state.failures.get(op) {
            return Err(err.clone());
        }
        Ok(state)
    }
}

impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn features(&self) -> Result<BTreeSet<String>, AdapterError> {
        let state = self.record("features", &[])?;
        Ok(state.features.keys().cloned().collect())
    }

    fn get(&self, key: &str) -> Result<FeatureConfig, AdapterError> {
        let state = self.record("get", &[key])?;
        Ok(state.features.get(key).cloned().unwrap_or_default())
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, FeatureConfig>, AdapterError> {
        let state = self.record("get_multi", keys)?;
        Ok(keys
            .iter()
            .filter(|key| !state.omitted_from_get_multi.contains(**key))
            .map(|key| {
                let config = state.features.get(*key).cloned().unwrap_or_default();
                (key.to_string(), config)
            })
            .collect())
    }

    fn get_all(&self) -> Result<FeatureConfigs, AdapterError> {
        let state = self.record("get_all", &[])?;
        Ok(state
            .features
            .iter()
            .map(|(key, config)| (key.clone(), config.clone()))
            .collect())
    }

    fn add(&self, key: &str) -> Result<bool, AdapterError> {
        let mut state = self.record("add", &[key])?;
        state.features.entry(key.to_owned()).or_default();
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool, AdapterError> {
        let mut state = self.record("remove", &[key])?;
        state.features.remove(key);
        Ok(true)
    }

    fn clear(&self, key: &str) -> Result<bool, AdapterError> {
        let mut state = self.record("clear", &[key])?;
        if let Some(config) = state.features.get_mut(key) {
            *config = FeatureConfig::default();
        }
        Ok(true)
    }

    fn enable(&self, key: &str, _gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        let mut state = self.record("enable", &[key])?;
        if let GateValue::Boolean(value) = target {
            state.features.entry(key.to_owned()).or_default().boolean = Some(*value);
        }
        Ok(true)
    }

    fn disable(&self, key: &str, _gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        let mut state = self.record("disable", &[key])?;
        if let GateValue::Boolean(_) = target {
            state.features.entry(key.to_owned()).or_default().boolean = Some(false);
        }
        Ok(true)
    }
}
