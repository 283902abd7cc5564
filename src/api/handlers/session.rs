use crate::auth::AuthenticatedSubject;
use axum::{response::Json, Extension};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub admin: bool,
    /// Set when the administrator flag could not be resolved.
    pub degraded: bool,
}

#[utoipa::path(
    get,
    path= "/api/session",
    responses (
        (status = 200, description = "Authenticated session", body = Session),
        (status = 401, description = "Unauthorized")
    ),
    tag= "auth"
)]
// axum handler for session
pub async fn session(Extension(caller): Extension<AuthenticatedSubject>) -> Json<Session> {
    Json(Session {
        subject: caller.subject,
        admin: caller.is_admin,
        degraded: caller.capability_degraded,
    })
}
