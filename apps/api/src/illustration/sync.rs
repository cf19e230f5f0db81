//! Page-image synchronizer: fills missing page illustrations left to right.
//!
//! # Ordering
//! `fill` walks pages strictly in index order and stops at the first failure:
//! a stalled page blocks later pages until the caller retries, so a reader
//! moving forward never finds a later page illustrated before an earlier one.
//!
//! # Persistence
//! Images produced in a pass are written back in ONE update of the full
//! positional array after the loop, whether the loop completed or stopped.
//! `regenerate` writes only its own slot (read-modify-write).
//!
//! # Single flight
//! At most one `fill` or `regenerate` per story runs at a time; a second
//! request for the same story is rejected with `AppError::Conflict`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};
use uuid::Uuid;

use super::attempts::{AttemptTable, GenerationAttempt};
use super::client::{GenerateOptions, ImageGenerationClient};
use super::{ImageGenError, FALLBACK_NOTICE};
use crate::errors::AppError;
use crate::models::story::StoryRow;
use crate::pagination::Page;
use crate::store::{require_story, StoryStore};

/// Result of one `fill` pass.
#[derive(Debug, Clone, Serialize)]
pub struct FillReport {
    /// 0-based indices that received an image in this pass, in order.
    pub generated: Vec<usize>,
    /// Index the pass stopped at, if it did not reach the end.
    pub stopped_at: Option<usize>,
    /// Soft, user-facing notice (fallback illustration in use).
    pub notice: Option<String>,
    /// Generic failure indicator for non-recoverable provider errors.
    pub error: Option<String>,
    pub attempts: Vec<GenerationAttempt>,
}

/// Per-story single-flight tokens.
#[derive(Default)]
struct StoryLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl StoryLocks {
    fn try_acquire(&self, story_id: Uuid) -> Option<OwnedMutexGuard<()>> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(story_id)
            .or_default()
            .clone();
        lock.try_lock_owned().ok()
    }
}

pub struct PageImageSynchronizer {
    client: Arc<ImageGenerationClient>,
    store: Arc<dyn StoryStore>,
    attempts: AttemptTable,
    locks: StoryLocks,
}

impl PageImageSynchronizer {
    pub fn new(client: Arc<ImageGenerationClient>, store: Arc<dyn StoryStore>) -> Self {
        Self {
            client,
            store,
            attempts: AttemptTable::new(),
            locks: StoryLocks::default(),
        }
    }

    pub fn attempts(&self, story_id: Uuid) -> Vec<GenerationAttempt> {
        self.attempts.snapshot(story_id)
    }

    /// Marks a page whose stored image failed to display; the next fill retries it.
    pub fn mark_display_failure(&self, story_id: Uuid, page_index: usize) {
        self.attempts
            .fail(story_id, page_index, "image_load_error", "Image failed to load");
    }

    pub fn forget(&self, story_id: Uuid) {
        self.attempts.forget(story_id);
    }

    fn acquire(&self, story_id: Uuid) -> Result<OwnedMutexGuard<()>, AppError> {
        self.locks.try_acquire(story_id).ok_or_else(|| {
            AppError::Conflict(format!(
                "Image generation already in progress for story {story_id}"
            ))
        })
    }

    fn options(story: &StoryRow, page_index: usize, force_new: bool) -> GenerateOptions {
        GenerateOptions {
            story_id: Some(story.id),
            theme: Some(story.theme()),
            reference_photo: story.child_photo_url.clone(),
            force_new,
            page_index: Some(page_index),
        }
    }

    /// Fills every page lacking an image (or marked failed), in order, stopping
    /// at the first failure. Mutates `pages` and `story.page_images` in place.
    pub async fn fill(
        &self,
        story: &mut StoryRow,
        pages: &mut [Page],
    ) -> Result<FillReport, AppError> {
        let _guard = self.acquire(story.id)?;

        let failed = self.attempts.failed_indices(story.id);
        let todo: Vec<usize> = pages
            .iter()
            .enumerate()
            .filter(|(i, page)| page.image_url.is_none() || failed.contains(i))
            .map(|(i, _)| i)
            .collect();

        if todo.is_empty() {
            return Ok(FillReport {
                generated: Vec::new(),
                stopped_at: None,
                notice: None,
                error: None,
                attempts: self.attempts.snapshot(story.id),
            });
        }

        info!(story_id = %story.id, pending = todo.len(), "Starting image fill pass");
        self.attempts.mark_pending(story.id, &todo);

        let mut produced: Vec<(usize, String)> = Vec::new();
        let mut stopped_at = None;
        let mut notice = None;
        let mut error = None;

        for &i in &todo {
            self.attempts.begin(story.id, i);
            // A failed page that still has an image holds a known-bad or fallback
            // image; the cache would just hand it back.
            let force_new = failed.contains(&i) && pages[i].image_url.is_some();
            let options = Self::options(story, i, force_new);

            match self.client.generate(&pages[i].text, &options).await {
                Ok(url) => {
                    pages[i].image_url = Some(url.clone());
                    produced.push((i, url));
                    self.attempts.succeed(story.id, i);
                }
                Err(ImageGenError::FallbackUsed { url, cause }) => {
                    // Keep the fallback visible, but leave the page marked failed so a
                    // later pass replaces it once the provider recovers.
                    warn!(story_id = %story.id, page = i, error = %cause, "Fallback illustration used, pausing fill");
                    pages[i].image_url = Some(url.clone());
                    produced.push((i, url));
                    self.attempts
                        .fail(story.id, i, "fallback_used", FALLBACK_NOTICE);
                    notice = Some(FALLBACK_NOTICE.to_string());
                    stopped_at = Some(i);
                    break;
                }
                Err(e) => {
                    warn!(story_id = %story.id, page = i, error = %e, "Stopping fill pass at failed page");
                    self.attempts.fail(story.id, i, e.kind(), &e.to_string());
                    error = Some(e.to_string());
                    stopped_at = Some(i);
                    break;
                }
            }
        }

        self.attempts.finish_pass(story.id);

        if !produced.is_empty() {
            let mut images = story.page_images.clone();
            for (i, url) in &produced {
                if images.len() <= *i {
                    images.resize(*i + 1, None);
                }
                images[*i] = Some(url.clone());
            }
            self.store.update_page_images(story.id, &images).await?;
            story.page_images = images;
            info!(
                story_id = %story.id,
                generated = produced.len(),
                "Persisted page images"
            );
        }

        Ok(FillReport {
            generated: produced.into_iter().map(|(i, _)| i).collect(),
            stopped_at,
            notice,
            error,
            attempts: self.attempts.snapshot(story.id),
        })
    }

    /// Regenerates one page regardless of cache or earlier failures.
    /// Returns the new image URL; on failure the page is marked failed and
    /// the error is surfaced unchanged.
    pub async fn regenerate(
        &self,
        story: &mut StoryRow,
        pages: &mut [Page],
        page_index: usize,
    ) -> Result<String, AppError> {
        let Some(page) = pages.get(page_index) else {
            return Err(AppError::Validation(format!(
                "Page index {page_index} out of range (story has {} pages)",
                pages.len()
            )));
        };
        let text = page.text.clone();

        let _guard = self.acquire(story.id)?;
        self.attempts.begin(story.id, page_index);

        let url = match self
            .client
            .generate(&text, &Self::options(story, page_index, true))
            .await
        {
            Ok(url) => url,
            Err(e) => {
                warn!(story_id = %story.id, page = page_index, error = %e, "Regeneration failed");
                // The client only records a fallback into an empty slot; mirror it.
                if let ImageGenError::FallbackUsed { url, .. } = &e {
                    if pages[page_index].image_url.is_none() {
                        pages[page_index].image_url = Some(url.clone());
                        if story.page_images.len() <= page_index {
                            story.page_images.resize(page_index + 1, None);
                        }
                        story.page_images[page_index] = Some(url.clone());
                    }
                }
                self.attempts
                    .fail(story.id, page_index, e.kind(), &e.to_string());
                return Err(e.into());
            }
        };

        let mut images = require_story(self.store.as_ref(), story.id)
            .await?
            .page_images;
        if images.len() <= page_index {
            images.resize(page_index + 1, None);
        }
        images[page_index] = Some(url.clone());
        self.store.update_page_images(story.id, &images).await?;

        pages[page_index].image_url = Some(url.clone());
        story.page_images = images;
        self.attempts.succeed(story.id, page_index);
        info!(story_id = %story.id, page = page_index, "Regenerated page image");

        Ok(url)
    }
}
