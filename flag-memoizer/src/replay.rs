use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::adapter::{Adapter, AdapterError, Gate, GateValue};
use crate::cache_store::LocalCache;
use crate::config::Config;
use crate::instrumented::InstrumentedAdapter;
use crate::memoizable::MemoizingAdapter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitOfWorkReport {
    pub unit: usize,
    pub enabled: BTreeMap<String, bool>,
    pub backend_calls: u64,
    pub cache_entries: usize,
}

/// Adds every seed feature and fully enables the configured ones.
pub fn seed_backend<A: Adapter>(adapter: &A, config: &Config) -> Result<(), AdapterError> {
    for key in config.seed_features.iter() {
        adapter.add(key)?;
    }
    for key in config.enabled_features.iter() {
        adapter.enable(key, Gate::Boolean, &GateValue::Boolean(true))?;
    }
    Ok(())
}

/// Plays one unit of work against `backend` with its own cache: a bulk load,
/// then a batched and a single lookup of every key in `lookups`.
#[instrument(skip(backend, lookups))]
pub fn run_unit_of_work<A: Adapter>(
    backend: &Arc<InstrumentedAdapter<A>>,
    unit: usize,
    lookups: &[&str],
) -> Result<UnitOfWorkReport, AdapterError> {
    let calls_before = backend.total_calls();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(Arc::clone(backend), &cache);

    let all = adapter.get_all()?;
    let batch = adapter.get_multi(lookups)?;

    let mut enabled = BTreeMap::new();
    for key in lookups {
        let single = adapter.get(key)?;
        if single != batch[*key] {
            tracing::warn!(key, "single and batched lookups disagree");
        }
        let on = all.get(key).is_enabled_anywhere() || single.is_enabled_anywhere();
        enabled.insert(key.to_string(), on);
    }

    let report = UnitOfWorkReport {
        unit,
        enabled,
        backend_calls: backend.total_calls() - calls_before,
        cache_entries: cache.len(),
    };
    tracing::info!(
        backend_calls = report.backend_calls,
        cache_entries = report.cache_entries,
        "unit of work done"
    );
    Ok(report)
}
