// Memoizing adapter counters
pub const MEMOIZED_CACHE_HIT_COUNTER: &str = "flags_memoized_cache_hit_total";
pub const MEMOIZED_BATCH_LOAD_KEYS: &str = "flags_memoized_batch_load_keys";
pub const MEMOIZED_INVALIDATIONS_COUNTER: &str = "flags_memoized_invalidations_total";

// Backend adapter calls, recorded by the instrumented adapter
pub const ADAPTER_CALLS_COUNTER: &str = "flags_adapter_calls_total";
pub const ADAPTER_ERRORS_COUNTER: &str = "flags_adapter_errors_total";
pub const ADAPTER_CALL_TIME: &str = "flags_adapter_call_duration_seconds";
