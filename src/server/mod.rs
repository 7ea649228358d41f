//! Server initialization and routing

use crate::api;
use crate::middleware::{
    authenticate, normalize_error_response, ObservabilityLayer, ProtectedRouteExt, RequirePolicyLayer, SanitizedMakeSpan,
};
use crate::policy::MANAGE_AUTHORIZATION_POLICY;
use crate::state::{AppState, HasAuthz};
use anyhow::Result;
use axum::{
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Build the HTTP router for any state implementing [`HasAuthz`].
pub fn build_router<S: HasAuthz>(state: S) -> Router {
    let server = &state.config().server;
    let cors = build_cors(&server.cors_allowed_origins);
    let timeout = Duration::from_secs(server.request_timeout_secs);
    let manage_authorization =
        RequirePolicyLayer::new(state.policies().clone(), MANAGE_AUTHORIZATION_POLICY);

    Router::new()
        .route("/health", get(api::health::health))
        .route("/metrics", get(api::metrics::metrics_handler::<S>))
        .route("/api/v1/authz/claims", get(api::authz::get_claims))
        .route("/api/v1/authz/check", post(api::authz::check::<S>))
        .protected_route(
            "/api/v1/authz/policies",
            get(api::authz::list_policies::<S>),
            manage_authorization,
        )
        .layer(from_fn_with_state(state.clone(), authenticate::<S>))
        .layer(TraceLayer::new_for_http().make_span_with(SanitizedMakeSpan))
        .layer(TimeoutLayer::new(timeout))
        .layer(from_fn(normalize_error_response))
        .layer(cors)
        .layer(ObservabilityLayer)
        .with_state(state)
}

fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState) -> Result<()> {
    let http_addr = state.config.http_addr();
    info!(
        policies = state.policies.len(),
        environment = %state.config.environment,
        "Authorization policies loaded"
    );

    let app = build_router(state);
    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
