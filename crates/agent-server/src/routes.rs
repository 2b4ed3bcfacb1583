//! Router

use axum::{routing::get, Router};

use crate::handlers::{
    create_thread, delete_thread, get_thread, health_check, list_messages, list_models,
    list_threads, send_message, update_thread,
};
use crate::state::AppState;

/// All routes, without middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))

        // Threads
        .route("/api/threads", get(list_threads).post(create_thread))
        .route(
            "/api/threads/{id}",
            get(get_thread).patch(update_thread).delete(delete_thread),
        )

        // Messages (POST streams the turn)
        .route("/api/threads/{id}/messages", get(list_messages).post(send_message))

        .with_state(state)
}
