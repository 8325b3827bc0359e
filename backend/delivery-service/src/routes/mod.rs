pub mod devices;
pub mod health;
pub mod messages;

use actix_middleware::get_correlation_id;
use actix_web::{web, HttpRequest};

use crate::error::AppError;
use crate::metrics::serve_metrics;

const JSON_LIMIT_BYTES: usize = 256 * 1024;

fn bad_request(message: String, req: &HttpRequest) -> actix_web::Error {
    tracing::debug!(
        path = %req.path(),
        correlation_id = ?get_correlation_id(req),
        error = %message,
        "rejected malformed request"
    );
    AppError::BadRequest(message).into()
}

/// Extractor configs that turn malformed bodies, paths and queries into
/// the regular 400 error body.
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT_BYTES)
            .error_handler(|err, req| bad_request(format!("invalid JSON body: {err}"), req)),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, req| bad_request(format!("invalid path: {err}"), req)),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, req| bad_request(format!("invalid query: {err}"), req)),
    );
}

/// Everything the service serves
pub fn configure(cfg: &mut web::ServiceConfig) {
    extractor_config(cfg);
    messages::register_routes(cfg);
    devices::register_routes(cfg);
    health::register_routes(cfg);
    cfg.route("/metrics", web::get().to(serve_metrics));
}
