use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{StoreError, StoryStore};
use crate::models::story::{ChildRow, NewStory, ProfileRow, StoryRow};

const STORY_SELECT: &str = r#"
    SELECT s.id, s.child_id, c.profile_id, c.name AS child_name, s.theme, s.content,
           s.image_url, s.child_photo_url, s.page_images, s.pdf_url, s.has_pdf, s.created_at
    FROM stories s
    JOIN children c ON c.id = s.child_id
"#;

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PgStoryStore {
    pool: PgPool,
}

impl PgStoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoryStore for PgStoryStore {
    async fn upsert_profile(
        &self,
        profile_id: Uuid,
        username: Option<&str>,
    ) -> Result<ProfileRow, StoreError> {
        // Single statement: concurrent sign-ins cannot race a check-then-insert.
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (id, username)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
                SET username = COALESCE(EXCLUDED.username, profiles.username)
            RETURNING id, username
            "#,
        )
        .bind(profile_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_child(&self, child_id: Uuid) -> Result<Option<ChildRow>, StoreError> {
        Ok(sqlx::query_as::<_, ChildRow>(
            "SELECT id, profile_id, name, age FROM children WHERE id = $1",
        )
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_story(&self, story_id: Uuid) -> Result<Option<StoryRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, StoryRow>(&format!("{STORY_SELECT} WHERE s.id = $1"))
                .bind(story_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_stories(&self, profile_id: Uuid) -> Result<Vec<StoryRow>, StoreError> {
        Ok(sqlx::query_as::<_, StoryRow>(&format!(
            "{STORY_SELECT} WHERE c.profile_id = $1 ORDER BY s.created_at DESC"
        ))
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_story(&self, story: NewStory) -> Result<StoryRow, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO stories (child_id, theme, content, image_url, child_photo_url, page_images)
            VALUES ($1, $2, $3, $4, $5, '{}')
            RETURNING id
            "#,
        )
        .bind(story.child_id)
        .bind(story.theme.to_string())
        .bind(&story.content)
        .bind(&story.image_url)
        .bind(story.child_photo_url.as_deref())
        .fetch_one(&self.pool)
        .await?;

        info!(story_id = %id, child_id = %story.child_id, "Inserted story");

        self.get_story(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Story {id}")))
    }

    async fn update_page_images(
        &self,
        story_id: Uuid,
        page_images: &[Option<String>],
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE stories SET page_images = $1 WHERE id = $2")
            .bind(page_images)
            .bind(story_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Story {story_id}")));
        }
        Ok(())
    }

    async fn set_export(&self, story_id: Uuid, pdf_url: Option<&str>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE stories SET pdf_url = $1, has_pdf = $2 WHERE id = $3")
            .bind(pdf_url)
            .bind(pdf_url.is_some())
            .bind(story_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Story {story_id}")));
        }
        Ok(())
    }

    async fn delete_story(&self, story_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(story_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Story {story_id}")));
        }
        info!(story_id = %story_id, "Deleted story");
        Ok(())
    }
}
