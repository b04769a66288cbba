use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

pub static FETCH_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "timeline_fetch_requests_total",
        "Resource fetches grouped by resource and outcome",
        &["resource", "outcome"]
    )
    .expect("fetch requests total")
});

pub static FETCH_ITEMS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "timeline_fetch_items_total",
        "Events normalized from fetched pages grouped by resource",
        &["resource"]
    )
    .expect("fetch items total")
});

pub static FETCH_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "timeline_fetch_latency_seconds",
        "Wall time spent fetching every page of a resource",
        &["resource"],
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("fetch latency")
});

pub fn record_fetch(resource: &str, outcome: &str, elapsed_secs: f64) {
    FETCH_REQUESTS_TOTAL
        .with_label_values(&[resource, outcome])
        .inc();
    FETCH_LATENCY_SECONDS
        .with_label_values(&[resource])
        .observe(elapsed_secs);
}

pub fn record_items(resource: &str, count: usize) {
    FETCH_ITEMS_TOTAL
        .with_label_values(&[resource])
        .inc_by(count as u64);
}
