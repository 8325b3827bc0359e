//! HTTP request metrics
//!
//! Two latency profiles share one server. Ordinary requests answer in
//! milliseconds while held requests (long-polls) stay open until data
//! arrives or the poll window closes. One histogram would bury both, so held
//! routes are declared when the middleware is built and observed into their
//! own histogram.
//!
//! Labels use the matched route pattern (`/pending/{deviceId}`), never the
//! raw path, and the status class instead of the exact code.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::StatusCode,
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGauge, IntGaugeVec,
};
use std::rc::Rc;
use std::time::Instant;

const UNMATCHED: &str = "unmatched";

lazy_static::lazy_static! {
    static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "HTTP requests by route and status class",
        &["method", "route", "status_class"]
    ).expect("Prometheus metrics registration should succeed at startup");

    static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "Latency of requests answered immediately",
        &["method", "route"],
        vec![0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    ).expect("Prometheus metrics registration should succeed at startup");

    // Dense around the default 25s poll window.
    static ref HTTP_HELD_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_held_request_duration_seconds",
        "How long held requests stayed open before answering",
        &["route", "status_class"],
        vec![0.05, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 24.0, 25.0, 26.0, 30.0, 60.0]
    ).expect("Prometheus metrics registration should succeed at startup");

    static ref HTTP_REQUESTS_IN_FLIGHT: IntGaugeVec = register_int_gauge_vec!(
        "http_requests_in_flight",
        "Requests currently open, parked long-polls included",
        &["route"]
    ).expect("Prometheus metrics registration should succeed at startup");
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        5 => "5xx",
        _ => "other",
    }
}

/// Decrements the in-flight gauge on drop, so a client hanging up on a
/// parked poll still releases its slot.
struct InFlight(IntGauge);

impl InFlight {
    fn enter(route: &str) -> Self {
        let gauge = HTTP_REQUESTS_IN_FLIGHT.with_label_values(&[route]);
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Prometheus middleware.
///
/// ```ignore
/// App::new().wrap(HttpMetrics::new().held_route("/api/v1/messages/pending/{deviceId}"))
/// ```
#[derive(Debug, Clone, Default)]
pub struct HttpMetrics {
    held_routes: Vec<&'static str>,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record requests matching `pattern` as held requests.
    pub fn held_route(mut self, pattern: &'static str) -> Self {
        self.held_routes.push(pattern);
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for HttpMetrics
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = HttpMetricsService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HttpMetricsService {
            service: Rc::new(service),
            held_routes: self.held_routes.clone().into(),
        }))
    }
}

pub struct HttpMetricsService<S> {
    service: Rc<S>,
    held_routes: Rc<[&'static str]>,
}

impl<S, B> Service<ServiceRequest> for HttpMetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let method = req.method().to_string();
        let route = req
            .match_pattern()
            .unwrap_or_else(|| UNMATCHED.to_string());
        let held = self.held_routes.iter().any(|p| *p == route);

        Box::pin(async move {
            let _in_flight = InFlight::enter(&route);
            let start = Instant::now();
            let result = service.call(req).await;
            let elapsed = start.elapsed().as_secs_f64();

            let status = match &result {
                Ok(res) => res.status(),
                Err(e) => e.as_response_error().status_code(),
            };
            let class = status_class(status);

            HTTP_REQUESTS_TOTAL
                .with_label_values(&[&method, &route, class])
                .inc();
            if held {
                HTTP_HELD_REQUEST_DURATION_SECONDS
                    .with_label_values(&[&route, class])
                    .observe(elapsed);
            } else {
                HTTP_REQUEST_DURATION_SECONDS
                    .with_label_values(&[&method, &route])
                    .observe(elapsed);
            }

            result
        })
    }
}
