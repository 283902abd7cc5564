#![allow(clippy::needless_for_each)]

use crate::{
    api::handlers::{
        collar, collar::__path_collar, health, health::__path_health, reunite::__path_redeem,
        session, session::__path_session,
    },
    auth::{AuthGate, REFRESH_HEADER},
    lookup::{CollarLookupFlow, ContactDetails},
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

mod error;
pub(crate) mod handlers;
mod middleware;

pub use error::ApiError;
pub use middleware::require_auth;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub lookup: Arc<CollarLookupFlow>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, collar, session, redeem),
    components(schemas(
        health::Health,
        collar::CollarResponse,
        session::Session,
        ContactDetails
    )),
    tags(
        (name = "reunite", description = "Relay code lookup for lost pets")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router.
///
/// `/health` and `/collar/:tag_id` are public; everything under `/api` passes
/// through [`require_auth`].
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(REFRESH_HEADER),
        ])
        .allow_methods([Method::GET])
        .allow_origin(Any);

    let protected = Router::new()
        .route("/api/session", get(handlers::session))
        .route("/api/v1/reunite/ext/:code", get(handlers::redeem))
        .route_layer(from_fn_with_state(state.gate.clone(), require_auth));

    Router::new()
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/collar/:tag_id", get(handlers::collar))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors),
        )
        .with_state(state)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
