pub mod health;
pub mod uploads;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::conversation::handlers as conversation;
use crate::finalize::handlers as finalize;
use crate::opportunity::handlers as opportunity;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Conversation
        .route("/api/v1/chat", post(conversation::handle_chat))
        .route("/api/v1/chat/state", post(conversation::handle_state))
        // Opportunities
        .route(
            "/api/v1/opportunities/:id/context",
            get(opportunity::handle_get_context),
        )
        // Applications
        .route(
            "/api/v1/applications/finalize",
            post(finalize::handle_finalize),
        )
        .route(
            "/api/v1/uploads",
            post(uploads::handle_upload).layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}
