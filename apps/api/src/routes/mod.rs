pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::export::handlers as export;
use crate::illustration::handlers as illustration;
use crate::state::AppState;
use crate::stories::handlers as stories;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/profile", put(stories::handle_upsert_profile))
        // Stories
        .route(
            "/api/v1/stories",
            get(stories::handle_list_stories).post(stories::handle_create_story),
        )
        .route(
            "/api/v1/stories/:id",
            get(stories::handle_get_story).delete(stories::handle_delete_story),
        )
        // Illustrations
        .route(
            "/api/v1/stories/:id/images/fill",
            post(illustration::handle_fill),
        )
        .route(
            "/api/v1/stories/:id/pages/:index/regenerate",
            post(illustration::handle_regenerate),
        )
        .route(
            "/api/v1/stories/:id/pages/:index/image-error",
            post(illustration::handle_image_error),
        )
        .route(
            "/api/v1/stories/:id/attempts",
            get(illustration::handle_attempts),
        )
        // Export
        .route(
            "/api/v1/stories/:id/export",
            post(export::handle_export).delete(export::handle_invalidate_export),
        )
        .with_state(state)
}
