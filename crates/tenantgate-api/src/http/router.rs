//! Axum router configuration with middleware.
//!
//! The tenant routes are mounted at the root and again under `/current` and
//! `/v4`, so older clients keep working. Middleware: CORS, tracing.

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Path prefixes the tenant routes are served under, besides the root.
pub const ROUTE_ALIASES: [&str; 2] = ["/current", "/v4"];

fn tenant_routes() -> Router<AppState> {
    Router::new()
        .route("/command", get(handlers::command::run_command))
        .route("/info", get(handlers::info::get_info))
        .route("/message", get(handlers::message::get_leading))
        .route("/message/{id}", get(handlers::message::get_message))
        .route(
            "/webhook",
            get(handlers::webhook::list_webhooks)
                .post(handlers::webhook::add_webhook)
                .delete(handlers::webhook::remove_webhooks),
        )
}

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new().merge(tenant_routes());
    for alias in ROUTE_ALIASES {
        router = router.nest(alias, tenant_routes());
    }

    router
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness and delivery counters (no auth required).
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
        "delivery": state.dispatcher.stats(),
    }))
}
