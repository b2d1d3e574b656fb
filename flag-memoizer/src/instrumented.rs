use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::adapter::{Adapter, AdapterError, Gate, GateValue};
use crate::feature::{FeatureConfig, FeatureConfigs};
use crate::metrics::consts::{ADAPTER_CALLS_COUNTER, ADAPTER_CALL_TIME, ADAPTER_ERRORS_COUNTER};
use crate::metrics::utils::{histogram, inc};

pub const INSTRUMENTED_ADAPTER_NAME: &str = "instrumented";

/// Adapter that reports every call made to the adapter it wraps.
///
/// Each call increments `flags_adapter_calls_total`, records its latency in
/// `flags_adapter_call_duration_seconds` and, on failure, increments
/// `flags_adapter_errors_total`. All three are labelled with the wrapped
/// adapter's name and the operation. Counts are also kept locally so callers
/// can read them back without a metrics recorder.
pub struct InstrumentedAdapter<A> {
    inner: A,
    calls: Mutex<HashMap<&'static str, u64>>,
}

impl<A: Adapter> InstrumentedAdapter<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Number of `op` calls that reached the wrapped adapter, failed ones included.
    pub fn call_count(&self, op: &str) -> u64 {
        self.lock_calls().get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u64 {
        self.lock_calls().values().sum()
    }

    // Helper method to safely lock the calls map
    fn lock_calls(&self) -> MutexGuard<'_, HashMap<&'static str, u64>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn instrument<T, F>(&self, op: &'static str, call: F) -> Result<T, AdapterError>
    where
        F: FnOnce(&A) -> Result<T, AdapterError>,
    {
        let start = Instant::now();
        let result = call(&self.inner);
        let elapsed = start.elapsed();

        *self.lock_calls().entry(op).or_insert(0) += 1;

        let adapter = self.inner.name();
        let labels = [
            ("adapter".to_string(), adapter.to_string()),
            ("op".to_string(), op.to_string()),
        ];
        inc(ADAPTER_CALLS_COUNTER, &labels, 1);
        histogram(ADAPTER_CALL_TIME, &labels, elapsed.as_secs_f64());

        match &result {
            Ok(_) => tracing::debug!(adapter, op, ?elapsed, "adapter call"),
            Err(err) => {
                inc(ADAPTER_ERRORS_COUNTER, &labels, 1);
                tracing::warn!(adapter, op, error = %err, "adapter call failed");
            }
        }

        result
    }
}

impl<A: Adapter> Adapter for InstrumentedAdapter<A> {
    fn name(&self) -> &str {
        INSTRUMENTED_ADAPTER_NAME
    }

    fn features(&self) -> Result<BTreeSet<String>, AdapterError> {
        self.instrument("features", |inner| inner.features())
    }

    fn get(&self, key: &str) -> Result<FeatureConfig, AdapterError> {
        self.instrument("get", |inner| inner.get(key))
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, FeatureConfig>, AdapterError> {
        self.instrument("get_multi", |inner| inner.get_multi(keys))
    }

    fn get_all(&self) -> Result<FeatureConfigs, AdapterError> {
        self.instrument("get_all", |inner| inner.get_all())
    }

    fn add(&self, key: &str) -> Result<bool, AdapterError> {
        self.instrument("add", |inner| inner.add(key))
    }

    fn remove(&self, key: &str) -> Result<bool, AdapterError> {
        self.instrument("remove", |inner| inner.remove(key))
    }

    fn clear(&self, key: &str) -> Result<bool, AdapterError> {
        self.instrument("clear", |inner| inner.clear(key))
    }

    fn enable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        self.instrument("enable", |inner| inner.enable(key, gate, target))
    }

    fn disable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        self.instrument("disable", |inner| inner.disable(key, gate, target))
    }

    fn default_config(&self) -> FeatureConfig {
        self.inner.default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockAdapter;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_counts_calls_per_operation() {
        let adapter = InstrumentedAdapter::new(MockAdapter::new());

        adapter.get("a").unwrap();
        adapter.get("b").unwrap();
        adapter.features().unwrap();

        assert_eq!(adapter.call_count("get"), 2);
        assert_eq!(adapter.call_count("features"), 1);
        assert_eq!(adapter.call_count("get_all"), 0);
        assert_eq!(adapter.total_calls(), 3);
    }

    #[test]
    fn test_failures_pass_through_and_are_counted() {
        let mock = MockAdapter::new();
        mock.fail_with("add", AdapterError::Unavailable("down".to_string()));
        let adapter = InstrumentedAdapter::new(mock);

        let err = adapter.add("a").unwrap_err();

        assert_eq!(err, AdapterError::Unavailable("down".to_string()));
        assert_eq!(adapter.call_count("add"), 1);
    }

    #[test]
    fn test_records_metrics_labelled_by_adapter_and_op() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let mock = MockAdapter::new();
        mock.fail_with("get", AdapterError::Unavailable("down".to_string()));

        metrics::with_local_recorder(&recorder, || {
            let adapter = InstrumentedAdapter::new(mock);
            adapter.features().unwrap();
            adapter.get("a").unwrap_err();
        });

        let counters: HashMap<(String, String), u64> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => {
                    let op = key
                        .key()
                        .labels()
                        .find(|label| label.key() == "op")
                        .map(|label| label.value().to_string())
                        .unwrap_or_default();
                    Some(((key.key().name().to_string(), op), count))
                }
                _ => None,
            })
            .collect();

        let calls = |op: &str| counters.get(&(ADAPTER_CALLS_COUNTER.to_string(), op.to_string()));
        let errors = |op: &str| counters.get(&(ADAPTER_ERRORS_COUNTER.to_string(), op.to_string()));
        assert_eq!(calls("features"), Some(&1));
        assert_eq!(calls("get"), Some(&1));
        assert_eq!(errors("get"), Some(&1));
        assert_eq!(errors("features"), None);
    }
}
