//! Axum route handlers for story export.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::pagination::build_pages;
use crate::session::SessionContext;
use crate::state::AppState;
use crate::stories::load_owned_story;

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub pdf_url: String,
}

/// POST /api/v1/stories/:id/export
///
/// Returns the existing export if one is confirmed, otherwise renders one.
pub async fn handle_export(
    State(state): State<AppState>,
    session: SessionContext,
    Path(story_id): Path<Uuid>,
) -> Result<Json<ExportResponse>, AppError> {
    let story = load_owned_story(state.store.as_ref(), &session, story_id).await?;
    let pages = build_pages(&story.content, &story.page_images);
    let pdf_url = state.exports.export(&story, &pages).await?;
    Ok(Json(ExportResponse { pdf_url }))
}

/// DELETE /api/v1/stories/:id/export
pub async fn handle_invalidate_export(
    State(state): State<AppState>,
    session: SessionContext,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    load_owned_story(state.store.as_ref(), &session, story_id).await?;
    state.exports.invalidate(story_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
