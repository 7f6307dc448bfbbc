//! Gateway error type and its HTTP mapping.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use tollgate_core::domain::Dimension;
use tollgate_core::error::AdmissionError;
use tollgate_shared::ApiError;

/// Every distinct failure of the request path, mapped onto the endpoint's
/// error contract. The limiter core classifies; this type translates.
#[derive(Debug)]
pub enum GatewayError {
    /// Malformed body or auth header shape.
    InvalidRequest(String),
    /// Authorization header present but not resolvable to a credential.
    InvalidCredential,
    /// Credential not present in the registry.
    UnknownCredential,
    /// Admission denied; carries which limit tripped and the wait hint.
    RateLimited {
        dimension: Dimension,
        retry_after_ms: u64,
    },
    /// Shared store unreachable or past its deadline. Fails closed.
    StoreUnavailable,
    /// Unexpected script reply or any unclassified fault.
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            GatewayError::InvalidCredential => write!(f, "invalid credential"),
            GatewayError::UnknownCredential => write!(f, "unknown credential"),
            GatewayError::RateLimited {
                dimension,
                retry_after_ms,
            } => write!(f, "rate limited on {dimension}, retry in {retry_after_ms}ms"),
            GatewayError::StoreUnavailable => write!(f, "shared store unavailable"),
            GatewayError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidCredential | GatewayError::UnknownCredential => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::InvalidRequest(msg) => {
                HttpResponse::BadRequest().json(ApiError::invalid_request(msg.clone()))
            }
            GatewayError::InvalidCredential | GatewayError::UnknownCredential => {
                HttpResponse::Unauthorized().json(ApiError::invalid_api_key())
            }
            GatewayError::RateLimited {
                dimension,
                retry_after_ms,
            } => {
                // Retry-After is whole seconds, rounded up.
                let retry_after_secs = retry_after_ms.div_ceil(1000);
                HttpResponse::TooManyRequests()
                    .insert_header(("Retry-After", retry_after_secs.to_string()))
                    .json(ApiError::rate_limit_exceeded(
                        dimension.as_str(),
                        *retry_after_ms,
                    ))
            }
            GatewayError::StoreUnavailable => {
                HttpResponse::ServiceUnavailable().json(ApiError::upstream_unavailable())
            }
            GatewayError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                HttpResponse::InternalServerError().json(ApiError::internal_error())
            }
        }
    }
}

impl From<AdmissionError> for GatewayError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Admission store unavailable, failing closed");
                GatewayError::StoreUnavailable
            }
            AdmissionError::Script(msg) => GatewayError::Internal(msg),
        }
    }
}
