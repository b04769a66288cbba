use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_transport_requests_total",
        "HTTP attempts sent through the retry transport by status class",
        &["status_class"]
    )
    .expect("requests total metric")
});

pub static RETRIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_transport_retries_total",
        "Retries scheduled by the transport grouped by reason",
        &["reason"]
    )
    .expect("retries metric")
});

pub static LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "gh_transport_latency_seconds",
        "Latency of individual HTTP attempts",
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("latency metric")
});

pub static CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_transport_cache_hits_total",
        "Response cache lookups answered by a fresh entry"
    )
    .expect("cache hits metric")
});

pub static CACHE_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_transport_cache_misses_total",
        "Response cache lookups that found no usable entry"
    )
    .expect("cache misses metric")
});

pub static CACHE_CORRUPT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_transport_cache_corrupt_total",
        "Cache files that could not be read or decoded"
    )
    .expect("cache corrupt metric")
});

pub static CACHE_WRITE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_transport_cache_write_failures_total",
        "Cache writes rejected or failed on disk"
    )
    .expect("cache write failures metric")
});

pub static CACHE_SWEPT: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_transport_cache_swept_total",
        "Cache files removed by the retention sweep"
    )
    .expect("cache swept metric")
});

pub fn status_class(status: http::StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
