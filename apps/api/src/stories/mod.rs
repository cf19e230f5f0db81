// Stories: composition of new story text, CRUD handlers and the JSON views
// shared with the illustration and export handlers.

pub mod compose;
pub mod handlers;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::story::StoryRow;
use crate::pagination::{build_pages, Page};
use crate::session::SessionContext;
use crate::store::{require_story, StoryStore};

/// One page as the reader shows it. `display_image_url` falls back to the
/// story cover while the page has no image of its own.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub index: usize,
    pub number: usize,
    pub text: String,
    pub image_url: Option<String>,
    pub display_image_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryView {
    pub id: Uuid,
    pub child_id: Uuid,
    pub child_name: String,
    pub title: String,
    pub theme: String,
    pub image_url: String,
    pub child_photo_url: Option<String>,
    pub pdf_url: Option<String>,
    pub has_pdf: bool,
    pub created_at: DateTime<Utc>,
    pub page_count: usize,
    pub pages: Vec<PageView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorySummary {
    pub id: Uuid,
    pub child_name: String,
    pub title: String,
    pub theme: String,
    pub image_url: String,
    pub has_pdf: bool,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
}

pub fn page_views(story: &StoryRow, pages: &[Page]) -> Vec<PageView> {
    pages
        .iter()
        .enumerate()
        .map(|(index, page)| PageView {
            index,
            number: page.number,
            text: page.text.clone(),
            image_url: page.image_url.clone(),
            display_image_url: page
                .image_url
                .clone()
                .unwrap_or_else(|| story.image_url.clone()),
        })
        .collect()
}

impl StoryView {
    pub fn new(story: &StoryRow) -> Self {
        let pages = build_pages(&story.content, &story.page_images);
        StoryView {
            id: story.id,
            child_id: story.child_id,
            child_name: story.child_name.clone(),
            title: story.title(),
            theme: story.theme().to_string(),
            image_url: story.image_url.clone(),
            child_photo_url: story.child_photo_url.clone(),
            pdf_url: story.confirmed_export().map(str::to_string),
            has_pdf: story.has_pdf,
            created_at: story.created_at,
            page_count: pages.len(),
            pages: page_views(story, &pages),
        }
    }
}

impl From<&StoryRow> for StorySummary {
    fn from(story: &StoryRow) -> Self {
        StorySummary {
            id: story.id,
            child_name: story.child_name.clone(),
            title: story.title(),
            theme: story.theme().to_string(),
            image_url: story.image_url.clone(),
            has_pdf: story.has_pdf,
            page_count: crate::pagination::paginate(&story.content).len(),
            created_at: story.created_at,
        }
    }
}

/// Loads a story the session's profile owns.
pub async fn load_owned_story(
    store: &dyn StoryStore,
    session: &SessionContext,
    story_id: Uuid,
) -> Result<StoryRow, AppError> {
    let story = require_story(store, story_id).await?;
    session.ensure_owner(&story)?;
    Ok(story)
}
