//! Axum route handlers for profiles and stories.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::compose::compose_story;
use super::{load_owned_story, StorySummary, StoryView};
use crate::errors::AppError;
use crate::illustration::{GenerateOptions, ImageGenError, FALLBACK_NOTICE};
use crate::image_client::prompts::cover_text;
use crate::models::story::{NewStory, ProfileRow, Theme};
use crate::session::SessionContext;
use crate::state::AppState;
use crate::storage::paths::{extension_of, generate_storage_path, CHILD_PHOTO_PREFIX};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpsertProfileRequest {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateStoryResponse {
    pub story: StoryView,
    /// Set when the cover is a fallback illustration.
    pub notice: Option<String>,
}

struct Photo {
    bytes: Bytes,
    file_name: Option<String>,
    content_type: Option<String>,
}

#[derive(Default)]
struct CreateStoryForm {
    child_id: Option<Uuid>,
    theme: Option<String>,
    prompt: Option<String>,
    photo: Option<Photo>,
}

async fn read_form(mut multipart: Multipart) -> Result<CreateStoryForm, AppError> {
    let bad = |e: axum::extract::multipart::MultipartError| {
        AppError::Validation(format!("Malformed multipart body: {e}"))
    };
    let mut form = CreateStoryForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "child_id" => {
                let raw = field.text().await.map_err(bad)?;
                let id = Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::Validation("child_id must be a UUID".to_string()))?;
                form.child_id = Some(id);
            }
            "theme" => form.theme = Some(field.text().await.map_err(bad)?),
            "prompt" => form.prompt = Some(field.text().await.map_err(bad)?),
            "photo" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad)?;
                form.photo = Some(Photo {
                    bytes,
                    file_name,
                    content_type,
                });
            }
            other => warn!("Ignoring unexpected form field '{other}'"),
        }
    }
    Ok(form)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// PUT /api/v1/profile
///
/// Idempotent: creates the profile row on first call, updates the username after.
pub async fn handle_upsert_profile(
    State(state): State<AppState>,
    session: SessionContext,
    Json(request): Json<UpsertProfileRequest>,
) -> Result<Json<ProfileRow>, AppError> {
    let username = request
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let profile = state
        .store
        .upsert_profile(session.profile_id, username)
        .await?;
    Ok(Json(profile))
}

/// POST /api/v1/stories
///
/// Multipart: `child_id`, `theme`, optional `prompt`, `photo` (file).
/// Uploads the photo, composes the text, generates a cover and stores the story.
pub async fn handle_create_story(
    State(state): State<AppState>,
    session: SessionContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreateStoryResponse>), AppError> {
    let form = read_form(multipart).await?;

    let child_id = form
        .child_id
        .ok_or_else(|| AppError::Validation("child_id is required".to_string()))?;
    let theme_raw = form
        .theme
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("theme is required".to_string()))?;
    let photo = form
        .photo
        .filter(|p| !p.bytes.is_empty())
        .ok_or_else(|| AppError::Validation("photo is required".to_string()))?;
    let prompt = form.prompt.filter(|p| !p.trim().is_empty());
    let theme = Theme::from(theme_raw.as_str());

    let child = state
        .store
        .get_child(child_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Child {child_id}")))?;
    if child.profile_id != session.profile_id {
        return Err(AppError::Forbidden);
    }

    let content = compose_story(&child.name, &theme, prompt.as_deref());

    let key = generate_storage_path(CHILD_PHOTO_PREFIX, &extension_of(photo.file_name.as_deref()));
    let content_type = photo
        .content_type
        .unwrap_or_else(|| "image/jpeg".to_string());
    let child_photo_url = state
        .objects
        .put(&state.config.image_bucket, &key, photo.bytes, &content_type)
        .await?;

    let options = GenerateOptions {
        theme: Some(theme.clone()),
        reference_photo: Some(child_photo_url.clone()),
        ..GenerateOptions::default()
    };
    let (cover_url, notice) = match state
        .images
        .generate(&cover_text(&child.name, &theme, prompt.as_deref()), &options)
        .await
    {
        Ok(url) => (url, None),
        Err(ImageGenError::FallbackUsed { url, .. }) => (url, Some(FALLBACK_NOTICE.to_string())),
        Err(e) => return Err(e.into()),
    };

    let story = state
        .store
        .insert_story(NewStory {
            child_id,
            theme,
            content,
            image_url: cover_url,
            child_photo_url: Some(child_photo_url),
        })
        .await?;
    info!(story_id = %story.id, child_id = %child_id, "Story created");

    Ok((
        StatusCode::CREATED,
        Json(CreateStoryResponse {
            story: StoryView::new(&story),
            notice,
        }),
    ))
}

/// GET /api/v1/stories
pub async fn handle_list_stories(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<Vec<StorySummary>>, AppError> {
    let stories = state.store.list_stories(session.profile_id).await?;
    Ok(Json(stories.iter().map(StorySummary::from).collect()))
}

/// GET /api/v1/stories/:id
pub async fn handle_get_story(
    State(state): State<AppState>,
    session: SessionContext,
    Path(story_id): Path<Uuid>,
) -> Result<Json<StoryView>, AppError> {
    let story = load_owned_story(state.store.as_ref(), &session, story_id).await?;
    Ok(Json(StoryView::new(&story)))
}

/// DELETE /api/v1/stories/:id
pub async fn handle_delete_story(
    State(state): State<AppState>,
    session: SessionContext,
    Path(story_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    load_owned_story(state.store.as_ref(), &session, story_id).await?;
    state.store.delete_story(story_id).await?;
    state.sync.forget(story_id);
    info!(%story_id, "Story deleted");
    Ok(StatusCode::NO_CONTENT)
}
