//! Bearer token authentication
//!
//! [`JwtAuthMiddleware`] resolves `Authorization: Bearer <token>` into a
//! [`Principal`] and stores it in the request extensions. Requests without
//! the header pass through untouched so routes can decide for themselves
//! whether a caller must be authenticated; a header that is present but
//! does not resolve is rejected with a 401 JSON body.
//!
//! Handlers that require a caller take [`Principal`] as an extractor,
//! handlers where authentication is optional take `Option<Principal>`.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::AUTHORIZATION, StatusCode},
    Error, HttpMessage, HttpResponse, ResponseError,
};
use crypto_core::jwt::{JwtError, JwtKeys, TokenKind};
use error_types::{error_codes, error_types as kinds, reason_phrase, ErrorResponse};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;

use crate::correlation_id::CorrelationId;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authentication required")]
    Missing,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Missing => error_codes::TOKEN_MISSING,
            AuthError::Expired => error_codes::TOKEN_EXPIRED,
            AuthError::MalformedHeader | AuthError::Invalid => error_codes::TOKEN_INVALID,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let status = StatusCode::UNAUTHORIZED.as_u16();
        ErrorResponse::new(
            reason_phrase(status),
            &self.to_string(),
            status,
            kinds::AUTHENTICATION_ERROR,
            self.code(),
        )
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}

/// Maps a raw bearer credential to a user identity.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<Principal, AuthError>;
}

impl PrincipalResolver for JwtKeys {
    fn resolve(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self
            .validate(token, TokenKind::Access)
            .map_err(|e| match e {
                JwtError::Expired => AuthError::Expired,
                other => {
                    tracing::debug!(error = %other, "JWT validation failed");
                    AuthError::Invalid
                }
            })?;

        let id = claims.user_id().map_err(|e| {
            tracing::warn!(error = %e, "token subject is not a user id");
            AuthError::Invalid
        })?;

        Ok(Principal {
            id,
            email: claims.email,
        })
    }
}

/// Parse the Authorization header. `Ok(None)` when the header is absent.
fn bearer_token(req: &ServiceRequest) -> Result<Option<&str>, AuthError> {
    let Some(value) = req.headers().get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::Invalid);
    }
    Ok(Some(token))
}

/// JWT Authentication Middleware
#[derive(Clone)]
pub struct JwtAuthMiddleware {
    resolver: Arc<dyn PrincipalResolver>,
}

impl JwtAuthMiddleware {
    pub fn new(resolver: Arc<dyn PrincipalResolver>) -> Self {
        Self { resolver }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = JwtAuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            resolver: self.resolver.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    resolver: Arc<dyn PrincipalResolver>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let outcome = match bearer_token(&req) {
            Ok(Some(token)) => self.resolver.resolve(token).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(principal) => {
                if let Some(principal) = principal {
                    req.extensions_mut().insert(principal);
                }
                let service = self.service.clone();
                Box::pin(async move {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                })
            }
            Err(err) => {
                let res = reject(req, err);
                Box::pin(async move { Ok(res) })
            }
        }
    }
}

fn reject<B>(req: ServiceRequest, err: AuthError) -> ServiceResponse<EitherBody<B>> {
    tracing::warn!(path = %req.path(), error = %err, "rejected bearer token");

    let trace_id = req.extensions().get::<CorrelationId>().map(|c| c.0.clone());
    let mut body = err.body();
    if let Some(trace_id) = trace_id {
        body = body.with_trace_id(trace_id);
    }

    let response = HttpResponse::build(err.status_code()).json(body);
    req.into_response(response).map_into_right_body()
}

impl actix_web::FromRequest for Principal {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        match req.extensions().get::<Principal>() {
            Some(principal) => ready(Ok(principal.clone())),
            None => ready(Err(AuthError::Missing.into())),
        }
    }
}
