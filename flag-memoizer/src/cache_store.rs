//! Key-value stores the memoizing adapter writes into.
//!
//! Stores are owned by the caller, usually one per unit of work. The adapter
//! only ever reads, writes and deletes single entries.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::feature::FeatureConfig;

/// Holds the set of every known feature key.
pub const FEATURES_KEY: &str = "flipper_features";
/// Present iff a bulk load has put every feature's config in the store.
pub const GET_ALL_KEY: &str = "all_memoized";
/// Namespace for per-feature entries. Neither reserved key starts with it.
pub const FEATURE_KEY_PREFIX: &str = "feature/";

/// Store key for the config of feature `key`.
pub fn key_for(key: &str) -> String {
    format!("{FEATURE_KEY_PREFIX}{key}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Feature(FeatureConfig),
    FeatureKeys(BTreeSet<String>),
    AllLoaded,
}

impl CacheValue {
    pub fn into_feature(self) -> Option<FeatureConfig> {
        match self {
            CacheValue::Feature(config) => Some(config),
            _ => None,
        }
    }

    pub fn into_feature_keys(self) -> Option<BTreeSet<String>> {
        match self {
            CacheValue::FeatureKeys(keys) => Some(keys),
            _ => None,
        }
    }
}

pub trait CacheStore {
    fn get(&self, key: &str) -> Option<CacheValue>;

    fn set(&self, key: &str, value: CacheValue);

    fn delete(&self, key: &str) -> Option<CacheValue>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the stored value, or runs `load` and stores its output.
    /// Nothing is stored when `load` fails.
    fn fetch_or_try_insert_with<E, F>(&self, key: &str, load: F) -> Result<CacheValue, E>
    where
        Self: Sized,
        F: FnOnce() -> Result<CacheValue, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = load()?;
        self.set(key, value.clone());
        Ok(value)
    }
}

/// Single-threaded store, the usual choice for one request.
#[derive(Debug, Default)]
pub struct LocalCache {
    entries: RefCell<HashMap<String, CacheValue>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl CacheStore for LocalCache {
    fn get(&self, key: &str) -> Option<CacheValue> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: CacheValue) {
        self.entries.borrow_mut().insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) -> Option<CacheValue> {
        self.entries.borrow_mut().remove(key)
    }
}

/// Store that can be shared across threads. Each call locks once; sequences of
/// calls are not atomic.
#[derive(Debug, Default)]
pub struct SyncCache {
    entries: Mutex<HashMap<String, CacheValue>>,
}

impl SyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Helper method to safely lock the entries map
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheValue>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock_entries().keys().cloned().collect()
    }
}

impl CacheStore for SyncCache {
    fn get(&self, key: &str) -> Option<CacheValue> {
        self.lock_entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: CacheValue) {
        self.lock_entries().insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) -> Option<CacheValue> {
        self.lock_entries().remove(key)
    }
}
