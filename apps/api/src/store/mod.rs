//! Record store boundary: profiles, children and stories.
//!
//! `AppState` holds an `Arc<dyn StoryStore>`; production uses `PgStoryStore`,
//! tests use the in-memory store.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::story::{ChildRow, NewStory, ProfileRow, StoryRow};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),
}

#[async_trait]
pub trait StoryStore: Send + Sync {
    /// Creates the profile row if absent; never fails because it already exists.
    async fn upsert_profile(
        &self,
        profile_id: Uuid,
        username: Option<&str>,
    ) -> Result<ProfileRow, StoreError>;

    async fn get_child(&self, child_id: Uuid) -> Result<Option<ChildRow>, StoreError>;

    async fn get_story(&self, story_id: Uuid) -> Result<Option<StoryRow>, StoreError>;

    /// All stories belonging to the profile's children, newest first.
    async fn list_stories(&self, profile_id: Uuid) -> Result<Vec<StoryRow>, StoreError>;

    async fn insert_story(&self, story: NewStory) -> Result<StoryRow, StoreError>;

    /// Overwrites the whole positional image-reference array.
    async fn update_page_images(
        &self,
        story_id: Uuid,
        page_images: &[Option<String>],
    ) -> Result<(), StoreError>;

    /// Sets (or clears, with `None`) the export reference and the `has_pdf` flag together.
    async fn set_export(&self, story_id: Uuid, pdf_url: Option<&str>) -> Result<(), StoreError>;

    async fn delete_story(&self, story_id: Uuid) -> Result<(), StoreError>;
}

/// Loads a story or reports it missing.
pub async fn require_story(store: &dyn StoryStore, story_id: Uuid) -> Result<StoryRow, StoreError> {
    store
        .get_story(story_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Story {story_id}")))
}
