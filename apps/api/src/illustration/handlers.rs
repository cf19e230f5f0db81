//! Axum route handlers for page illustrations.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::sync::FillReport;
use super::GenerationAttempt;
use crate::errors::AppError;
use crate::pagination::build_pages;
use crate::session::SessionContext;
use crate::state::AppState;
use crate::stories::{load_owned_story, page_views, PageView};

#[derive(Debug, Serialize)]
pub struct FillResponse {
    #[serde(flatten)]
    pub report: FillReport,
    pub pages: Vec<PageView>,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub page_index: usize,
    pub image_url: String,
    pub attempts: Vec<GenerationAttempt>,
}

/// POST /api/v1/stories/:id/images/fill
///
/// Runs one sequential fill pass. Provider failures do not fail the request:
/// they are reported in `error` / `notice` with the page left marked failed.
pub async fn handle_fill(
    State(state): State<AppState>,
    session: SessionContext,
    Path(story_id): Path<Uuid>,
) -> Result<Json<FillResponse>, AppError> {
    let mut story = load_owned_story(state.store.as_ref(), &session, story_id).await?;
    let mut pages = build_pages(&story.content, &story.page_images);

    let report = state.sync.fill(&mut story, &mut pages).await?;

    Ok(Json(FillResponse {
        report,
        pages: page_views(&story, &pages),
    }))
}

/// POST /api/v1/stories/:id/pages/:index/regenerate
///
/// `index` is the 0-based page index.
pub async fn handle_regenerate(
    State(state): State<AppState>,
    session: SessionContext,
    Path((story_id, page_index)): Path<(Uuid, usize)>,
) -> Result<Json<RegenerateResponse>, AppError> {
    let mut story = load_owned_story(state.store.as_ref(), &session, story_id).await?;
    let mut pages = build_pages(&story.content, &story.page_images);

    let image_url = state
        .sync
        .regenerate(&mut story, &mut pages, page_index)
        .await?;

    Ok(Json(RegenerateResponse {
        page_index,
        image_url,
        attempts: state.sync.attempts(story_id),
    }))
}

/// POST /api/v1/stories/:id/pages/:index/image-error
///
/// The reader could not display a stored page image; the next fill retries it.
pub async fn handle_image_error(
    State(state): State<AppState>,
    session: SessionContext,
    Path((story_id, page_index)): Path<(Uuid, usize)>,
) -> Result<Json<Vec<GenerationAttempt>>, AppError> {
    let story = load_owned_story(state.store.as_ref(), &session, story_id).await?;
    let page_count = crate::pagination::paginate(&story.content).len();
    if page_index >= page_count {
        return Err(AppError::Validation(format!(
            "Page index {page_index} out of range (story has {page_count} pages)"
        )));
    }

    tracing::warn!(%story_id, page = page_index, "Reader reported a broken page image");
    state.sync.mark_display_failure(story_id, page_index);
    Ok(Json(state.sync.attempts(story_id)))
}

/// GET /api/v1/stories/:id/attempts
pub async fn handle_attempts(
    State(state): State<AppState>,
    session: SessionContext,
    Path(story_id): Path<Uuid>,
) -> Result<Json<Vec<GenerationAttempt>>, AppError> {
    load_owned_story(state.store.as_ref(), &session, story_id).await?;
    Ok(Json(state.sync.attempts(story_id)))
}
