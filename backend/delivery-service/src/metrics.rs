use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, TextEncoder};

static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "delivery_messages_sent_total",
        "Messages accepted by POST /send",
    )
    .expect("failed to create delivery_messages_sent_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register delivery_messages_sent_total");
    counter
});

static MESSAGES_ACKED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "delivery_messages_acked_total",
        "Messages flipped to delivered by acknowledgements",
    )
    .expect("failed to create delivery_messages_acked_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register delivery_messages_acked_total");
    counter
});

static LONG_POLLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "delivery_long_polls_total",
            "Completed long-polls by outcome",
        ),
        &["outcome"],
    )
    .expect("failed to create delivery_long_polls_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register delivery_long_polls_total");
    counter
});

static LONG_POLL_WAIT_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let histogram = HistogramVec::new(
        HistogramOpts::new(
            "delivery_long_poll_wait_seconds",
            "Time a long-poll was held open",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]),
        &["outcome"],
    )
    .expect("failed to create delivery_long_poll_wait_seconds");
    prometheus::default_registry()
        .register(Box::new(histogram.clone()))
        .expect("failed to register delivery_long_poll_wait_seconds");
    histogram
});

pub fn record_message_sent() {
    MESSAGES_SENT_TOTAL.inc();
}

pub fn record_acked(count: u64) {
    MESSAGES_ACKED_TOTAL.inc_by(count);
}

pub fn record_poll(outcome: &str, waited: Duration) {
    LONG_POLLS_TOTAL.with_label_values(&[outcome]).inc();
    LONG_POLL_WAIT_SECONDS
        .with_label_values(&[outcome])
        .observe(waited.as_secs_f64());
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
