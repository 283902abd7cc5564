use crate::{auth::AuthError, lookup::LookupError};
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::{debug, error, warn};

const RETRY_AFTER_SECONDS: &str = "30";

/// Boundary error: picks the status code and the redacted client message.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str),
    CodeNotFound,
    CollarNotFound,
    CodesExhausted,
    Internal(&'static str),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::CodeNotFound | Self::CollarNotFound => StatusCode::NOT_FOUND,
            Self::CodesExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "Unauthorized",
            Self::CodeNotFound => "Invalid or expired code",
            Self::CollarNotFound => "Collar not found or not registered",
            Self::CodesExhausted => "No codes available, retry later",
            Self::Internal(_) => "Internal server error",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential | AuthError::InvalidCredential { .. } => {
                Self::Unauthorized(err.kind())
            }
            AuthError::Rotation(source) => {
                error!(kind = source.kind(), "failed to sign rotated credentials");
                Self::Internal(err.kind())
            }
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::CollarNotFound => Self::CollarNotFound,
            LookupError::InvalidOrExpiredCode => Self::CodeNotFound,
            LookupError::KeyspaceExhausted => Self::CodesExhausted,
            LookupError::PayloadEncoding(_)
            | LookupError::CorruptPayload(_)
            | LookupError::Storage(_) => {
                error!(kind = err.kind(), error = %err, "collar lookup failed");
                Self::Internal(err.kind())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Unauthorized(kind) => debug!(kind, "request rejected"),
            Self::CodesExhausted => warn!(kind = "keyspace_exhausted", "code keyspace exhausted"),
            Self::Internal(kind) => error!(kind, "request failed"),
            Self::CodeNotFound | Self::CollarNotFound => {}
        }

        let mut response =
            (self.status(), Json(json!({ "error": self.message() }))).into_response();
        if matches!(self, Self::CodesExhausted) {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECONDS));
        }
        response
    }
}
