use crate::{
    api::{error::ApiError, AppState},
    auth::AuthenticatedSubject,
    lookup::ContactDetails,
};
use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use tracing::info;

#[utoipa::path(
    get,
    path= "/api/v1/reunite/ext/{code}",
    params(
        ("code" = String, Path, description = "Relay code read out by the finder")
    ),
    responses (
        (status = 200, description = "Owner contact for the code", body = ContactDetails),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Invalid or expired code")
    ),
    tag= "reunite"
)]
// axum handler for code redemption
pub async fn redeem(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedSubject>,
    Path(code): Path<String>,
) -> Result<Json<ContactDetails>, ApiError> {
    let contact = state.lookup.consume(&code)?;
    info!(subject = %caller.subject, "relay code redeemed");
    Ok(Json(contact))
}
