mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::session::Explorer;

pub fn create_router(explorer: Explorer) -> Router {
    let api = Router::new()
        // Session
        .route("/session", get(handlers::get_session))
        .route("/status", get(handlers::get_status))
        .route("/explore", post(handlers::explore))
        .route("/navigate/{id}", post(handlers::navigate))
        .route("/reset", post(handlers::reset))
        // Collection
        .route("/explorations", get(handlers::list_explorations))
        .route("/explorations/{id}", delete(handlers::delete_exploration))
        .route("/explorations/{id}/load", post(handlers::load_exploration))
        .route("/explorations/{id}/tree", get(handlers::exploration_tree))
        .route("/export", get(handlers::export_all))
        .route("/import", post(handlers::import_all))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(explorer)
}
