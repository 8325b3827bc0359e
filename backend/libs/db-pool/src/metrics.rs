//! Pool occupancy and per-query acquire latency
//!
//! Every parked long-poll re-queries on each interval, so under load most
//! acquires come from pending lookups. The acquire histogram carries a
//! `query` label so that traffic can be told apart from sends and acks when
//! the pool saturates.

use prometheus::{
    register_gauge_vec, register_histogram_vec, register_int_gauge_vec, GaugeVec, HistogramVec,
    IntGaugeVec,
};
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use std::time::Instant;

lazy_static::lazy_static! {
    static ref POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_connections",
        "Pool connections by state (idle, in_use, max)",
        &["service", "state"]
    ).expect("Prometheus metrics registration should succeed at startup");

    static ref POOL_SATURATION: GaugeVec = register_gauge_vec!(
        "db_pool_saturation_ratio",
        "Connections in use divided by the pool maximum",
        &["service"]
    ).expect("Prometheus metrics registration should succeed at startup");

    // Upper buckets reach the default 10s acquire timeout.
    static ref POOL_ACQUIRE_SECONDS: HistogramVec = register_histogram_vec!(
        "db_pool_acquire_seconds",
        "Time spent waiting for a pooled connection, by query and outcome",
        &["service", "query", "outcome"],
        vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).expect("Prometheus metrics registration should succeed at startup");
}

fn saturation(in_use: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    f64::from(in_use) / f64::from(max)
}

fn outcome<T>(result: &Result<T, sqlx::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(sqlx::Error::PoolTimedOut) => "timeout",
        Err(sqlx::Error::PoolClosed) => "closed",
        Err(_) => "error",
    }
}

/// Sample occupancy gauges; run at startup and then on a timer.
pub(crate) fn record_pool_state(pool: &PgPool, service: &str) {
    let size = pool.size();
    let idle = pool.num_idle() as u32;
    let in_use = size.saturating_sub(idle);
    let max = pool.options().get_max_connections();

    POOL_CONNECTIONS
        .with_label_values(&[service, "idle"])
        .set(i64::from(idle));
    POOL_CONNECTIONS
        .with_label_values(&[service, "in_use"])
        .set(i64::from(in_use));
    POOL_CONNECTIONS
        .with_label_values(&[service, "max"])
        .set(i64::from(max));
    POOL_SATURATION
        .with_label_values(&[service])
        .set(saturation(in_use, max));
}

/// Check out a connection for `query`, timing the wait.
pub async fn acquire_for(
    pool: &PgPool,
    service: &str,
    query: &'static str,
) -> Result<PoolConnection<Postgres>, sqlx::Error> {
    let start = Instant::now();
    let result = pool.acquire().await;

    POOL_ACQUIRE_SECONDS
        .with_label_values(&[service, query, outcome(&result)])
        .observe(start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::warn!(service, query, error = %e, "pool acquire failed");
    }
    result
}
