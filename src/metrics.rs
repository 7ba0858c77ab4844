use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, IntGauge, register_counter, register_counter_vec,
    register_histogram, register_int_gauge,
};

lazy_static! {
    pub static ref SUBMISSIONS_TOTAL: Counter =
        register_counter!("contact_submissions_total", "Total contact form submissions").unwrap();
    pub static ref REJECTIONS_TOTAL: CounterVec = register_counter_vec!(
        "contact_rejections_total",
        "Rejected contact submissions by reason",
        &["reason"]
    )
    .unwrap();
    pub static ref SUBMISSION_LATENCY: Histogram = register_histogram!(
        "contact_submission_latency_seconds",
        "Contact submission latency in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: IntGauge = register_int_gauge!(
        "contact_rate_limit_entries",
        "Live rate limit windows across limiters"
    )
    .unwrap();
    pub static ref DUPLICATE_ENTRIES: IntGauge = register_int_gauge!(
        "contact_duplicate_entries",
        "Message hashes held by the duplicate guard"
    )
    .unwrap();
    pub static ref API_THROTTLED: Counter =
        register_counter!("contact_api_throttled_total", "API requests refused by the rate limiter").unwrap();
}
