use std::collections::{BTreeSet, HashMap, HashSet};

use crate::adapter::{Adapter, AdapterError, Gate, GateValue};
use crate::cache_store::{key_for, CacheStore, CacheValue, FEATURES_KEY, GET_ALL_KEY};
use crate::feature::{FeatureConfig, FeatureConfigs};
use crate::metrics::consts::MEMOIZED_BATCH_LOAD_KEYS;
use crate::metrics::utils::{histogram, track_cache_access, track_invalidation};

pub const MEMOIZABLE_ADAPTER_NAME: &str = "memoizable";

/// Adapter that remembers the results of another adapter's reads in a
/// caller-owned store, for as long as the caller keeps that store around.
///
/// Writes always go to the wrapped adapter first. Once it has accepted a
/// write, the entries the write made stale are dropped from the store.
///
/// ```
/// use flag_memoizer::{Adapter, LocalCache, MemoizingAdapter, MemoryAdapter};
///
/// let backend = MemoryAdapter::with_features(["search"]);
/// let cache = LocalCache::new();
/// let adapter = MemoizingAdapter::new(backend, &cache);
///
/// let all = adapter.get_all().unwrap();
/// assert!(all.contains_key("search"));
/// assert_eq!(all.get("not-a-flag"), &adapter.default_config());
/// ```
pub struct MemoizingAdapter<'a, A, S> {
    adapter: A,
    cache: &'a S,
}

impl<'a, A, S> MemoizingAdapter<'a, A, S>
where
    A: Adapter,
    S: CacheStore,
{
    pub fn new(adapter: A, cache: &'a S) -> Self {
        Self { adapter, cache }
    }

    /// The adapter being memoized.
    pub fn inner(&self) -> &A {
        &self.adapter
    }

    pub fn cache(&self) -> &'a S {
        self.cache
    }

    pub fn into_inner(self) -> A {
        self.adapter
    }

    fn cached_feature(&self, key: &str) -> Option<FeatureConfig> {
        self.cache
            .get(&key_for(key))
            .and_then(CacheValue::into_feature)
    }

    fn load_features(&self) -> Result<BTreeSet<String>, AdapterError> {
        tracing::debug!(adapter = self.adapter.name(), "loading feature keys");
        let keys = self.adapter.features()?;
        self.cache
            .set(FEATURES_KEY, CacheValue::FeatureKeys(keys.clone()));
        Ok(keys)
    }

    fn load_feature(&self, key: &str) -> Result<FeatureConfig, AdapterError> {
        tracing::debug!(adapter = self.adapter.name(), key, "loading feature");
        let config = self.adapter.get(key)?;
        self.cache
            .set(&key_for(key), CacheValue::Feature(config.clone()));
        Ok(config)
    }

    /// Fetches `keys` in one round trip and stores whatever comes back.
    fn load_multi(&self, keys: &[&str]) -> Result<(), AdapterError> {
        tracing::debug!(
            adapter = self.adapter.name(),
            count = keys.len(),
            "batch loading features"
        );
        let response = self.adapter.get_multi(keys)?;
        histogram(MEMOIZED_BATCH_LOAD_KEYS, &[], keys.len() as f64);

        for (key, config) in response {
            self.cache.set(&key_for(&key), CacheValue::Feature(config));
        }
        Ok(())
    }

    /// Bulk reads the wrapped adapter and marks the whole set as loaded.
    fn load_all(&self) -> Result<FeatureConfigs, AdapterError> {
        tracing::debug!(adapter = self.adapter.name(), "loading all features");
        let response = self.adapter.get_all()?;

        let mut keys = BTreeSet::new();
        for (key, config) in response.iter() {
            self.cache
                .set(&key_for(key), CacheValue::Feature(config.clone()));
            keys.insert(key.clone());
        }
        self.cache.set(FEATURES_KEY, CacheValue::FeatureKeys(keys));
        self.cache.set(GET_ALL_KEY, CacheValue::AllLoaded);

        Ok(response)
    }

    /// Rebuilds a bulk read from the store. Features whose entry was dropped by a
    /// write since the bulk load are fetched again in a single batch.
    fn rebuild_all(
        &self,
        keys: BTreeSet<String>,
    ) -> Result<HashMap<String, FeatureConfig>, AdapterError> {
        let stale: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|key| self.cached_feature(key).is_none())
            .collect();
        if !stale.is_empty() {
            self.load_multi(&stale)?;
        }

        let mut configs = HashMap::with_capacity(keys.len());
        for key in keys {
            let config = self
                .cached_feature(&key)
                .unwrap_or_else(|| self.adapter.default_config());
            configs.insert(key, config);
        }
        Ok(configs)
    }

    fn expire_feature(&self, op: &'static str, key: &str) {
        if self.cache.delete(&key_for(key)).is_some() {
            tracing::debug!(key, op, "expired memoized feature");
        }
        track_invalidation(op, "feature");
    }

    // The key set and the loaded marker only ever go together.
    fn expire_features_set(&self, op: &'static str) {
        self.cache.delete(FEATURES_KEY);
        self.cache.delete(GET_ALL_KEY);
        tracing::debug!(op, "expired memoized feature set");
        track_invalidation(op, "features_set");
    }
}

impl<A, S> Adapter for MemoizingAdapter<'_, A, S>
where
    A: Adapter,
    S: CacheStore,
{
    fn name(&self) -> &str {
        MEMOIZABLE_ADAPTER_NAME
    }

    fn features(&self) -> Result<BTreeSet<String>, AdapterError> {
        let mut cache_hit = true;
        let cached = self.cache.fetch_or_try_insert_with(FEATURES_KEY, || {
            cache_hit = false;
            self.adapter.features().map(CacheValue::FeatureKeys)
        })?;
        track_cache_access("features", cache_hit);

        match cached.into_feature_keys() {
            Some(keys) => Ok(keys),
            None => self.load_features(),
        }
    }

    fn get(&self, key: &str) -> Result<FeatureConfig, AdapterError> {
        let mut cache_hit = true;
        let cached = self.cache.fetch_or_try_insert_with(&key_for(key), || {
            cache_hit = false;
            self.adapter.get(key).map(CacheValue::Feature)
        })?;
        track_cache_access("get", cache_hit);

        match cached.into_feature() {
            Some(config) => Ok(config),
            None => self.load_feature(key),
        }
    }

    fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, FeatureConfig>, AdapterError> {
        let mut seen = HashSet::with_capacity(keys.len());
        let uncached: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| seen.insert(*key) && self.cached_feature(key).is_none())
            .collect();
        track_cache_access("get_multi", uncached.is_empty());

        if !uncached.is_empty() {
            self.load_multi(&uncached)?;
        }

        let mut result = HashMap::with_capacity(keys.len());
        for key in keys {
            let config = self
                .cached_feature(key)
                .unwrap_or_else(|| self.adapter.default_config());
            result.insert(key.to_string(), config);
        }
        Ok(result)
    }

    fn get_all(&self) -> Result<FeatureConfigs, AdapterError> {
        let loaded = self.cache.contains(GET_ALL_KEY);
        let cached_keys = self
            .cache
            .get(FEATURES_KEY)
            .and_then(CacheValue::into_feature_keys);

        let response = match (loaded, cached_keys) {
            (true, Some(keys)) => {
                track_cache_access("get_all", true);
                self.rebuild_all(keys)?
            }
            _ => {
                track_cache_access("get_all", false);
                self.load_all()?.into_inner()
            }
        };

        // Features the backend does not know about look up as the default
        // config, without another adapter call per lookup.
        Ok(FeatureConfigs::with_default(
            response,
            self.adapter.default_config(),
        ))
    }

    fn add(&self, key: &str) -> Result<bool, AdapterError> {
        let result = self.adapter.add(key)?;
        // The feature's own entry is left alone: a feature being added should
        // not have been read yet.
        self.expire_features_set("add");
        Ok(result)
    }

    fn remove(&self, key: &str) -> Result<bool, AdapterError> {
        let result = self.adapter.remove(key)?;
        self.expire_features_set("remove");
        self.expire_feature("remove", key);
        Ok(result)
    }

    fn clear(&self, key: &str) -> Result<bool, AdapterError> {
        let result = self.adapter.clear(key)?;
        self.expire_feature("clear", key);
        Ok(result)
    }

    fn enable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        let result = self.adapter.enable(key, gate, target)?;
        self.expire_feature("enable", key);
        Ok(result)
    }

    fn disable(&self, key: &str, gate: Gate, target: &GateValue) -> Result<bool, AdapterError> {
        let result = self.adapter.disable(key, gate, target)?;
        self.expire_feature("disable", key);
        Ok(result)
    }

    fn default_config(&self) -> FeatureConfig {
        self.adapter.default_config()
    }
}
