use std::collections::BTreeSet;

use rstest::rstest;

use flag_memoizer::cache_store::{key_for, FEATURES_KEY, GET_ALL_KEY};
use flag_memoizer::test_utils::MockAdapter;
use flag_memoizer::{
    Adapter, AdapterError, CacheStore, FeatureConfig, Gate, GateValue, LocalCache,
    MemoizingAdapter, MemoryAdapter, SyncCache,
};

fn enabled() -> FeatureConfig {
    FeatureConfig {
        boolean: Some(true),
        ..Default::default()
    }
}

fn with_actor(actor: &str) -> FeatureConfig {
    FeatureConfig {
        actors: BTreeSet::from([actor.to_string()]),
        ..Default::default()
    }
}

fn backend_with_a_and_b() -> MockAdapter {
    MockAdapter::new()
        .with_feature("a", enabled())
        .with_feature("b", with_actor("user:1"))
}

fn unavailable() -> AdapterError {
    AdapterError::Unavailable("connection refused".to_string())
}

#[test]
fn it_reads_through_once_per_key() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    let first = adapter.get("a").unwrap();
    assert_eq!(mock.call_count("get"), 1);

    let second = adapter.get("a").unwrap();
    assert_eq!(mock.call_count("get"), 1);
    assert_eq!(first, second);
    assert_eq!(first, enabled());
}

#[test]
fn it_memoizes_unknown_features_as_default() {
    let mock = MockAdapter::new();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    assert_eq!(adapter.get("missing").unwrap(), FeatureConfig::default());
    assert_eq!(adapter.get("missing").unwrap(), FeatureConfig::default());
    assert_eq!(mock.call_count("get"), 1);
}

#[test]
fn it_memoizes_the_feature_key_set() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    let keys = adapter.features().unwrap();
    assert_eq!(adapter.features().unwrap(), keys);

    assert_eq!(keys, BTreeSet::from(["a".to_string(), "b".to_string()]));
    assert_eq!(mock.call_count("features"), 1);
}

#[test]
fn it_batches_only_uncached_keys() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get("a").unwrap();
    let result = adapter.get_multi(&["a", "b", "c"]).unwrap();

    assert_eq!(mock.get_multi_requests(), vec![vec!["b", "c"]]);
    assert_eq!(result.len(), 3);
    assert_eq!(result["a"], enabled());
    assert_eq!(result["b"], with_actor("user:1"));
    assert_eq!(result["c"], FeatureConfig::default());
}

#[test]
fn it_batches_cold_keys_in_one_call_and_then_stops_asking() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    let first = adapter.get_multi(&["a", "b", "c"]).unwrap();
    assert_eq!(mock.get_multi_requests(), vec![vec!["a", "b", "c"]]);

    mock.reset_calls();
    let second = adapter.get_multi(&["a", "b", "c"]).unwrap();

    assert!(mock.get_calls().is_empty());
    assert_eq!(first, second);
}

#[test]
fn it_makes_no_call_for_an_empty_batch() {
    let mock = MockAdapter::new();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    assert!(adapter.get_multi(&[]).unwrap().is_empty());
    assert!(mock.get_calls().is_empty());
}

#[test]
fn it_serves_single_reads_from_a_batch() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get_multi(&["a", "b"]).unwrap();
    assert_eq!(adapter.get("b").unwrap(), with_actor("user:1"));

    assert_eq!(mock.call_count("get"), 0);
}

#[test]
fn it_loads_everything_once() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    let first = adapter.get_all().unwrap();
    let second = adapter.get_all().unwrap();

    assert_eq!(mock.call_count("get_all"), 1);
    assert_eq!(mock.get_calls().len(), 1);
    assert_eq!(first.into_inner(), second.into_inner());
}

#[test]
fn it_primes_every_entry_on_a_bulk_load() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get_all().unwrap();
    mock.reset_calls();

    assert_eq!(adapter.get("a").unwrap(), enabled());
    assert_eq!(adapter.get_multi(&["a", "b"]).unwrap().len(), 2);
    assert_eq!(adapter.features().unwrap().len(), 2);
    assert!(mock.get_calls().is_empty());

    assert!(cache.contains(FEATURES_KEY));
    assert!(cache.contains(GET_ALL_KEY));
    assert!(cache.contains(&key_for("a")));
    assert!(cache.contains(&key_for("b")));
}

#[test]
fn it_defaults_unknown_features_in_a_bulk_load() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    let all = adapter.get_all().unwrap();

    assert!(!all.contains_key("zzz"));
    assert_eq!(all.get("zzz"), &FeatureConfig::default());
    assert_eq!(all.get_configured("zzz"), None);
    assert_eq!(mock.get_calls().len(), 1);
}

#[test]
fn it_reloads_everything_after_a_feature_is_added() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get_all().unwrap();
    adapter.add("c").unwrap();
    let all = adapter.get_all().unwrap();

    assert_eq!(mock.call_count("get_all"), 2);
    assert!(all.contains_key("c"));
}

#[test]
fn it_reloads_everything_after_a_feature_is_removed() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get_all().unwrap();
    adapter.remove("b").unwrap();
    let all = adapter.get_all().unwrap();

    assert_eq!(mock.call_count("get_all"), 2);
    assert_eq!(all.len(), 1);
    assert!(!cache.contains(&key_for("b")));
}

#[test]
fn it_keeps_the_bulk_load_across_gate_changes() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get_all().unwrap();
    adapter
        .disable("a", Gate::Boolean, &GateValue::Boolean(false))
        .unwrap();
    let all = adapter.get_all().unwrap();

    assert_eq!(mock.call_count("get_all"), 1);
    assert_eq!(mock.get_multi_requests(), vec![vec!["a"]]);
    assert_eq!(all.get("a").boolean, Some(false));
}

#[rstest]
#[case::remove("remove")]
#[case::clear("clear")]
#[case::enable("enable")]
#[case::disable("disable")]
fn it_refetches_a_feature_after_a_write(#[case] op: &str) {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);
    let on = GateValue::Boolean(true);

    adapter.get("a").unwrap();
    match op {
        "remove" => adapter.remove("a"),
        "clear" => adapter.clear("a"),
        "enable" => adapter.enable("a", Gate::Boolean, &on),
        "disable" => adapter.disable("a", Gate::Boolean, &on),
        _ => unreachable!(),
    }
    .unwrap();
    assert!(!cache.contains(&key_for("a")));

    adapter.get("a").unwrap();
    adapter.get("a").unwrap();
    assert_eq!(mock.call_count("get"), 2);
}

#[rstest]
#[case::add("add")]
#[case::remove("remove")]
fn it_refetches_the_key_set_after_a_membership_change(#[case] op: &str) {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get_all().unwrap();
    match op {
        "add" => adapter.add("c"),
        "remove" => adapter.remove("a"),
        _ => unreachable!(),
    }
    .unwrap();
    assert!(!cache.contains(FEATURES_KEY));
    assert!(!cache.contains(GET_ALL_KEY));

    adapter.features().unwrap();
    adapter.features().unwrap();
    assert_eq!(mock.call_count("features"), 1);
}

#[rstest]
#[case::clear("clear")]
#[case::enable("enable")]
#[case::disable("disable")]
fn it_keeps_the_key_set_across_gate_writes(#[case] op: &str) {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);
    let target = GateValue::Actor("user:2".to_string());

    adapter.features().unwrap();
    match op {
        "clear" => adapter.clear("a"),
        "enable" => adapter.enable("a", Gate::Actor, &target),
        "disable" => adapter.disable("a", Gate::Actor, &target),
        _ => unreachable!(),
    }
    .unwrap();
    adapter.features().unwrap();

    assert_eq!(mock.call_count("features"), 1);
}

#[test]
fn it_invalidates_nothing_when_a_write_fails() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get_all().unwrap();
    mock.fail_with("remove", unavailable());
    mock.fail_with("enable", unavailable());

    assert_eq!(adapter.remove("a"), Err(unavailable()));
    assert_eq!(
        adapter.enable("b", Gate::Boolean, &GateValue::Boolean(true)),
        Err(unavailable())
    );

    assert!(cache.contains(FEATURES_KEY));
    assert!(cache.contains(GET_ALL_KEY));
    assert!(cache.contains(&key_for("a")));
    assert!(cache.contains(&key_for("b")));
    assert_eq!(adapter.get("a").unwrap(), enabled());
    assert_eq!(mock.call_count("get"), 0);
}

#[test]
fn it_caches_nothing_when_a_read_fails() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    mock.fail_with("get", unavailable());
    mock.fail_with("features", unavailable());
    mock.fail_with("get_all", unavailable());

    assert_eq!(adapter.get("a"), Err(unavailable()));
    assert_eq!(adapter.features(), Err(unavailable()));
    assert_eq!(adapter.get_all().map(|_| ()), Err(unavailable()));
    assert!(cache.is_empty());

    mock.recover("get");
    assert_eq!(adapter.get("a").unwrap(), enabled());
    assert_eq!(mock.call_count("get"), 2);
}

#[test]
fn it_populates_nothing_when_a_batch_fails() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    adapter.get("a").unwrap();
    mock.fail_with("get_multi", unavailable());

    assert_eq!(adapter.get_multi(&["a", "b"]), Err(unavailable()));
    assert_eq!(cache.len(), 1);
    assert!(!cache.contains(&key_for("b")));
}

#[test]
fn it_does_not_mark_everything_loaded_when_the_bulk_load_fails() {
    let mock = backend_with_a_and_b();
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(mock.clone(), &cache);

    mock.fail_with("get_all", unavailable());
    assert!(adapter.get_all().is_err());
    mock.recover("get_all");

    let all = adapter.get_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(mock.call_count("get_all"), 2);
}

#[test]
fn it_does_not_share_entries_between_caches() {
    let mock = backend_with_a_and_b();
    let first_cache = LocalCache::new();
    let second_cache = LocalCache::new();

    MemoizingAdapter::new(mock.clone(), &first_cache)
        .get("a")
        .unwrap();
    MemoizingAdapter::new(mock.clone(), &second_cache)
        .get("a")
        .unwrap();

    assert_eq!(mock.call_count("get"), 2);
}

#[test]
fn it_memoizes_into_a_shared_sync_cache() {
    let mock = backend_with_a_and_b();
    let cache = SyncCache::new();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let mock = mock.clone();
            let cache = &cache;
            scope.spawn(move || {
                let adapter = MemoizingAdapter::new(mock, cache);
                adapter.get_all().unwrap();
            });
        }
    });

    let adapter = MemoizingAdapter::new(mock.clone(), &cache);
    mock.reset_calls();
    assert_eq!(adapter.get_all().unwrap().len(), 2);
    assert!(mock.get_calls().is_empty());
}

#[test]
fn it_writes_through_to_a_memory_backend() {
    let cache = LocalCache::new();
    let adapter = MemoizingAdapter::new(MemoryAdapter::with_features(["search"]), &cache);

    assert!(!adapter.get("search").unwrap().is_enabled_anywhere());
    adapter
        .enable("search", Gate::PercentageOfActors, &GateValue::Percentage(25))
        .unwrap();
    assert_eq!(adapter.get("search").unwrap().percentage_of_actors, Some(25));

    let err = adapter
        .enable("search", Gate::PercentageOfTime, &GateValue::Percentage(120))
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidGateValue { .. }));
    assert_eq!(adapter.get("search").unwrap().percentage_of_time, None);
}
