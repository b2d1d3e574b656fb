pub mod adapter;
pub mod cache_store;
pub mod config;
pub mod feature;
pub mod instrumented;
pub mod memoizable;
pub mod memory;
pub mod metrics;
pub mod replay;

// Kept public so the integration tests under tests/ can use the mock adapter.
pub mod test_utils;

pub use adapter::{Adapter, AdapterError, Gate, GateValue};
pub use cache_store::{CacheStore, CacheValue, LocalCache, SyncCache};
pub use feature::{FeatureConfig, FeatureConfigs};
pub use instrumented::InstrumentedAdapter;
pub use memoizable::MemoizingAdapter;
pub use memory::MemoryAdapter;
