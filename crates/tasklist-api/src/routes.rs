use axum::{
    Json, Router, middleware,
    routing::{get, patch, post},
};

use tasklist_types::api::HealthResponse;

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{profile, todos};

/// Full application router. CORS and tracing layers are the binary's
/// concern; this is everything behind them.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/profile", get(profile::get_profile))
        .route("/api/todos", get(todos::list_todos).post(todos::create_todo))
        .route("/api/todos/{id}", patch(todos::update_todo).delete(todos::delete_todo))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".into() })
}
