//! Replays a few units of work against an in-memory flag backend, each with
//! its own memoizing cache, and reports how many backend calls they cost.
use std::sync::Arc;

use anyhow::Context;
use envconfig::Envconfig;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use flag_memoizer::config::Config;
use flag_memoizer::metrics::utils::setup_metrics_recorder;
use flag_memoizer::replay::{run_unit_of_work, seed_backend};
use flag_memoizer::{Adapter, InstrumentedAdapter, MemoryAdapter};

fn main() -> anyhow::Result<()> {
    let config = Config::init_from_env().context("Invalid configuration")?;

    // stdout with a level configured by the RUST_LOG envvar: pretty when
    // DEBUG is set, JSON otherwise.
    let log_layer = {
        let base_layer = fmt::layer().with_target(true).with_level(true);

        if *config.debug {
            base_layer
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_ansi(true)
                .with_filter(EnvFilter::from_default_env())
                .boxed()
        } else {
            base_layer
                .json()
                .with_filter(EnvFilter::from_default_env())
                .boxed()
        }
    };
    tracing_subscriber::registry().with(log_layer).init();

    let recorder = setup_metrics_recorder().context("failed to install metrics recorder")?;

    let backend = Arc::new(InstrumentedAdapter::new(MemoryAdapter::new()));
    seed_backend(&backend, &config).context("failed to seed backend")?;
    tracing::info!(
        features = config.seed_features.len(),
        enabled = config.enabled_features.len(),
        "seeded backend"
    );

    let lookups = config.lookup_features.as_strs();
    let mut backend_calls = 0;
    for unit in 0..config.units_of_work {
        let report = run_unit_of_work(&backend, unit, &lookups)?;
        backend_calls += report.backend_calls;
        tracing::info!(report = %serde_json::to_string(&report)?, "replayed unit of work");
    }

    let unmemoized = config.units_of_work * (1 + 2 * lookups.len());
    tracing::info!(
        units = config.units_of_work,
        backend_calls,
        unmemoized,
        "replay finished"
    );

    let snapshot = backend.get_all()?;
    tracing::info!(flags = %serde_json::to_string(&snapshot)?, "final flag state");
    tracing::debug!(metrics = %recorder.render(), "metrics");

    Ok(())
}
