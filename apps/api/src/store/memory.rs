//! In-memory record store for tests. Counts writes and can be told to fail them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{StoreError, StoryStore};
use crate::models::story::{ChildRow, NewStory, ProfileRow, StoryRow};

#[derive(Default)]
pub struct MemoryStoryStore {
    profiles: Mutex<HashMap<Uuid, ProfileRow>>,
    children: Mutex<HashMap<Uuid, ChildRow>>,
    stories: Mutex<HashMap<Uuid, StoryRow>>,
    pub page_image_writes: AtomicUsize,
    pub export_writes: AtomicUsize,
    pub fail_page_image_writes: AtomicBool,
}

impl MemoryStoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&self, profile_id: Uuid, name: &str) -> ChildRow {
        let child = ChildRow {
            id: Uuid::new_v4(),
            profile_id,
            name: name.to_string(),
            age: Some(6),
        };
        self.children.lock().unwrap().insert(child.id, child.clone());
        child
    }

    /// Inserts a story directly, bypassing composition.
    pub fn seed_story(&self, profile_id: Uuid, theme: &str, content: &str) -> StoryRow {
        let child = self.add_child(profile_id, "Mia");
        let story = StoryRow {
            id: Uuid::new_v4(),
            child_id: child.id,
            profile_id,
            child_name: child.name,
            theme: theme.to_string(),
            content: content.to_string(),
            image_url: "https://cdn.test/cover.jpg".to_string(),
            child_photo_url: None,
            page_images: Vec::new(),
            pdf_url: None,
            has_pdf: false,
            created_at: Utc::now(),
        };
        self.stories.lock().unwrap().insert(story.id, story.clone());
        story
    }

    pub fn story(&self, story_id: Uuid) -> StoryRow {
        self.stories.lock().unwrap()[&story_id].clone()
    }

    pub fn set_page_images(&self, story_id: Uuid, page_images: Vec<Option<String>>) {
        if let Some(story) = self.stories.lock().unwrap().get_mut(&story_id) {
            story.page_images = page_images;
        }
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }
}

#[async_trait]
impl StoryStore for MemoryStoryStore {
    async fn upsert_profile(
        &self,
        profile_id: Uuid,
        username: Option<&str>,
    ) -> Result<ProfileRow, StoreError> {
        let mut profiles = self.profiles.lock().unwrap();
        let row = profiles.entry(profile_id).or_insert_with(|| ProfileRow {
            id: profile_id,
            username: None,
        });
        if let Some(name) = username {
            row.username = Some(name.to_string());
        }
        Ok(row.clone())
    }

    async fn get_child(&self, child_id: Uuid) -> Result<Option<ChildRow>, StoreError> {
        Ok(self.children.lock().unwrap().get(&child_id).cloned())
    }

    async fn get_story(&self, story_id: Uuid) -> Result<Option<StoryRow>, StoreError> {
        Ok(self.stories.lock().unwrap().get(&story_id).cloned())
    }

    async fn list_stories(&self, profile_id: Uuid) -> Result<Vec<StoryRow>, StoreError> {
        let mut rows: Vec<StoryRow> = self
            .stories
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.profile_id == profile_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_story(&self, story: NewStory) -> Result<StoryRow, StoreError> {
        let child = self
            .children
            .lock()
            .unwrap()
            .get(&story.child_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Child {}", story.child_id)))?;
        let row = StoryRow {
            id: Uuid::new_v4(),
            child_id: child.id,
            profile_id: child.profile_id,
            child_name: child.name,
            theme: story.theme.to_string(),
            content: story.content,
            image_url: story.image_url,
            child_photo_url: story.child_photo_url,
            page_images: Vec::new(),
            pdf_url: None,
            has_pdf: false,
            created_at: Utc::now(),
        };
        self.stories.lock().unwrap().insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_page_images(
        &self,
        story_id: Uuid,
        page_images: &[Option<String>],
    ) -> Result<(), StoreError> {
        if self.fail_page_image_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut stories = self.stories.lock().unwrap();
        let story = stories
            .get_mut(&story_id)
            .ok_or_else(|| StoreError::NotFound(format!("Story {story_id}")))?;
        story.page_images = page_images.to_vec();
        self.page_image_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_export(&self, story_id: Uuid, pdf_url: Option<&str>) -> Result<(), StoreError> {
        let mut stories = self.stories.lock().unwrap();
        let story = stories
            .get_mut(&story_id)
            .ok_or_else(|| StoreError::NotFound(format!("Story {story_id}")))?;
        story.pdf_url = pdf_url.map(str::to_string);
        story.has_pdf = pdf_url.is_some();
        self.export_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_story(&self, story_id: Uuid) -> Result<(), StoreError> {
        self.stories
            .lock()
            .unwrap()
            .remove(&story_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Story {story_id}")))
    }
}
