use super::error::ApiError;
use crate::auth::AuthGate;
use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

/// Authenticate the request, bind the subject into extensions and attach
/// renewed credential cookies when a rotation happened.
///
/// # Errors
/// Returns 401 for any credential failure.
pub async fn require_auth(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let outcome = gate.authenticate(request.headers()).await?;
    request.extensions_mut().insert(outcome.subject);

    let mut response = next.run(request).await;

    if let Some(pair) = outcome.rotated {
        match gate.rotation_cookies(&pair) {
            Ok(cookies) => {
                for cookie in cookies {
                    response.headers_mut().append(SET_COOKIE, cookie);
                }
            }
            Err(err) => error!("Failed to build rotation cookies: {}", err),
        }
    }

    Ok(response)
}
