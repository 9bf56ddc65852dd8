//! Axum router construction.
//!
//! Routes, CORS, and per-request tracing spans.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use liferpg_core::Clock;
use liferpg_db::Store;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router.
///
/// `GET /health` sits at the root; everything else is nested under `/api`
/// (see `api_routes`). CORS allows any origin since the upstream
/// gateway owns access control.
pub fn build_router<S, C>(state: Arc<AppState<S, C>>) -> Router
where
    S: Store + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/health", get(handlers::health::<S, C>))
        .nest("/api", api_routes::<S, C>())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Registration, the two engines, and the caller's read models.
fn api_routes<S, C>() -> Router<Arc<AppState<S, C>>>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/users", post(handlers::register_user::<S, C>))
        .route("/tasks/{id}/complete", post(handlers::complete_task::<S, C>))
        .route(
            "/rewards/{id}/purchase",
            post(handlers::purchase_reward::<S, C>),
        )
        .route("/me/progress", get(handlers::get_progress::<S, C>))
        .route("/me/audit", get(handlers::get_audit::<S, C>))
}
