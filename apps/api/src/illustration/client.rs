//! Image generation client: cache lookup, provider call, durable capture and fallback.
//!
//! Flow for `generate(prompt, options)`:
//! 1. `story_id` set and not `force_new` → reuse the image stored for the first
//!    paragraph whose text equals `prompt` verbatim.
//! 2. Enrich the prompt with theme / reference-photo instructions, call the provider.
//! 3. Success → copy the provider image into object storage (provider URLs expire),
//!    record it on the story (best effort), return the durable URL.
//! 4. Rate / billing limit → record the theme fallback on the story and return
//!    `ImageGenError::FallbackUsed` so the caller can tell the user.
//! 5. Anything else → propagate, nothing written.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::fallback::fallback_image;
use super::ImageGenError;
use crate::image_client::prompts::illustration_prompt;
use crate::image_client::ImageProvider;
use crate::models::story::Theme;
use crate::pagination::paginate;
use crate::storage::paths::{generate_storage_path, GENERATED_PREFIX};
use crate::storage::{ImageFetcher, ObjectStore};
use crate::store::StoryStore;

/// Options for a single generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub story_id: Option<Uuid>,
    pub theme: Option<Theme>,
    /// Public URL of the child photo the illustration should depict.
    pub reference_photo: Option<String>,
    /// Skip the cache and always call the provider.
    pub force_new: bool,
    /// Page slot to record the result in. When `None`, the first paragraph
    /// whose text equals the prompt is used.
    pub page_index: Option<usize>,
}

pub struct ImageGenerationClient {
    provider: Arc<dyn ImageProvider>,
    store: Arc<dyn StoryStore>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn ImageFetcher>,
    image_bucket: String,
}

impl ImageGenerationClient {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        store: Arc<dyn StoryStore>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn ImageFetcher>,
        image_bucket: String,
    ) -> Self {
        Self {
            provider,
            store,
            objects,
            fetcher,
            image_bucket,
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ImageGenError> {
        if let (Some(story_id), false) = (options.story_id, options.force_new) {
            if let Some(url) = self.cached_image(story_id, prompt).await {
                debug!(story_id = %story_id, "Reusing stored illustration");
                return Ok(url);
            }
        }

        let enriched = illustration_prompt(
            prompt,
            options.theme.as_ref(),
            options.reference_photo.is_some(),
        );

        match self.provider.generate(&enriched).await {
            Ok(provider_url) => {
                let durable = self.capture(&provider_url).await?;
                if let Some(story_id) = options.story_id {
                    self.record_page_image(story_id, prompt, options.page_index, &durable, true)
                        .await;
                }
                Ok(durable)
            }
            Err(cause) if cause.is_quota() => {
                let url = fallback_image(options.theme.as_ref()).to_string();
                warn!(
                    story_id = ?options.story_id,
                    error = %cause,
                    "Provider quota reached, substituting fallback illustration"
                );
                // A forced regeneration must not swap a real image for a placeholder.
                if let Some(story_id) = options.story_id {
                    self.record_page_image(
                        story_id,
                        prompt,
                        options.page_index,
                        &url,
                        !options.force_new,
                    )
                    .await;
                }
                Err(ImageGenError::FallbackUsed { url, cause })
            }
            Err(cause) => {
                warn!(story_id = ?options.story_id, error = %cause, "Image generation failed");
                Err(ImageGenError::Provider(cause))
            }
        }
    }

    /// Stored image for the first paragraph whose text equals `prompt`.
    async fn cached_image(&self, story_id: Uuid, prompt: &str) -> Option<String> {
        let story = match self.store.get_story(story_id).await {
            Ok(Some(story)) => story,
            Ok(None) => return None,
            Err(e) => {
                warn!(story_id = %story_id, error = %e, "Cache lookup failed, generating anew");
                return None;
            }
        };

        let index = paginate(&story.content).iter().position(|t| t == prompt)?;
        story.page_images.get(index).cloned().flatten()
    }

    /// Copies a provider image into durable storage and returns the durable URL.
    async fn capture(&self, provider_url: &str) -> Result<String, ImageGenError> {
        let body = self.fetcher.fetch(provider_url).await?;
        let (extension, content_type) = sniff_image_type(&body);
        let key = generate_storage_path(GENERATED_PREFIX, extension);
        let url = self
            .objects
            .put(&self.image_bucket, &key, body, content_type)
            .await?;
        info!("Captured generated image as {key}");
        Ok(url)
    }

    /// Read-modify-write of the story's page-image slot for this prompt.
    ///
    /// Best effort: a failed write is logged and the URL is still handed back;
    /// durability is only confirmed by the synchronizer's own write. With
    /// `overwrite` unset an occupied slot is left alone.
    async fn record_page_image(
        &self,
        story_id: Uuid,
        prompt: &str,
        page_index: Option<usize>,
        url: &str,
        overwrite: bool,
    ) {
        let story = match self.store.get_story(story_id).await {
            Ok(Some(story)) => story,
            Ok(None) => {
                warn!(story_id = %story_id, "Story vanished before image could be recorded");
                return;
            }
            Err(e) => {
                warn!(story_id = %story_id, error = %e, "Could not load story to record image");
                return;
            }
        };

        let paragraphs = paginate(&story.content);
        let index = match page_index {
            Some(i) if i < paragraphs.len() => i,
            Some(i) => {
                warn!(story_id = %story_id, page = i, "Page index out of range, image not recorded");
                return;
            }
            None => match paragraphs.iter().position(|t| t == prompt) {
                Some(i) => i,
                None => {
                    debug!(story_id = %story_id, "Prompt matches no paragraph, image not recorded");
                    return;
                }
            },
        };

        let mut images = story.page_images;
        if images.len() <= index {
            images.resize(index + 1, None);
        }
        if !overwrite && images[index].is_some() {
            debug!(story_id = %story_id, page = index, "Slot already illustrated, keeping it");
            return;
        }
        images[index] = Some(url.to_string());

        if let Err(e) = self.store.update_page_images(story_id, &images).await {
            warn!(story_id = %story_id, page = index, error = %e, "Best-effort image write failed");
        }
    }
}

/// File extension and MIME type for captured image bytes, PNG when unknown.
fn sniff_image_type(body: &Bytes) -> (&'static str, &'static str) {
    match image::guess_format(body) {
        Ok(image::ImageFormat::Jpeg) => ("jpg", "image/jpeg"),
        Ok(image::ImageFormat::WebP) => ("webp", "image/webp"),
        _ => ("png", "image/png"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_client::ProviderError;
    use crate::store::memory::MemoryStoryStore;
    use crate::testing::{FakeFetcher, MemoryObjectStore, ScriptedProvider};

    struct Harness {
        store: Arc<MemoryStoryStore>,
        provider: Arc<ScriptedProvider>,
        objects: Arc<MemoryObjectStore>,
        client: ImageGenerationClient,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStoryStore::new());
        let provider = Arc::new(ScriptedProvider::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let client = ImageGenerationClient::new(
            provider.clone(),
            store.clone(),
            objects.clone(),
            Arc::new(FakeFetcher::new()),
            "story-images".to_string(),
        );
        Harness {
            store,
            provider,
            objects,
            client,
        }
    }

    fn options(story_id: Uuid, theme: Theme) -> GenerateOptions {
        GenerateOptions {
            story_id: Some(story_id),
            theme: Some(theme),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cached_image_skips_provider() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Safari", "One.\n\nTwo.");
        h.store
            .set_page_images(story.id, vec![None, Some("https://cdn.test/two.jpg".into())]);

        let url = h
            .client
            .generate("Two.", &options(story.id, Theme::Safari))
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.test/two.jpg");
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_matches_first_identical_paragraph() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Safari", "Same.\n\nOther.\n\nSame.");
        h.store
            .set_page_images(story.id, vec![Some("https://cdn.test/first.jpg".into())]);

        let url = h
            .client
            .generate("Same.", &options(story.id, Theme::Safari))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.test/first.jpg");
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_force_new_bypasses_cache_and_stores_durably() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Adventure", "One.\n\nTwo.");
        h.store
            .set_page_images(story.id, vec![Some("https://cdn.test/old.jpg".into())]);
        h.provider.push_ok("https://provider.test/tmp.png");

        let mut opts = options(story.id, Theme::Adventure);
        opts.force_new = true;
        let url = h.client.generate("One.", &opts).await.unwrap();

        assert_eq!(h.provider.calls(), 1);
        assert!(url.starts_with("mem://story-images/generated/"));
        assert_ne!(url, "https://provider.test/tmp.png");
        assert_eq!(h.objects.len(), 1);
        assert_eq!(h.store.story(story.id).page_images, vec![Some(url)]);
    }

    #[tokio::test]
    async fn test_prompt_is_enriched_with_theme() {
        let h = harness();
        h.provider.push_ok("https://provider.test/a.png");
        let opts = GenerateOptions {
            theme: Some(Theme::Friendship),
            reference_photo: Some("https://cdn.test/kid.jpg".into()),
            ..Default::default()
        };
        h.client.generate("Two friends share a kite.", &opts).await.unwrap();

        let sent = h.provider.prompts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("essence of friendship: Two friends share a kite."));
        assert!(sent[0].contains("reference photo"));
    }

    #[tokio::test]
    async fn test_billing_limit_records_safari_fallback_at_position() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Safari", "One.\n\nTwo.\n\nThree.");
        h.provider.push_err(ProviderError::BillingLimit);

        let err = h
            .client
            .generate("Two.", &options(story.id, Theme::Safari))
            .await
            .unwrap_err();

        let safari = fallback_image(Some(&Theme::Safari)).to_string();
        match err {
            ImageGenError::FallbackUsed { url, cause } => {
                assert_eq!(url, safari);
                assert!(matches!(cause, ProviderError::BillingLimit));
            }
            other => panic!("expected FallbackUsed, got {other:?}"),
        }
        assert_eq!(h.store.story(story.id).page_images, vec![None, Some(safari)]);
        assert_eq!(h.objects.len(), 0);
    }

    #[tokio::test]
    async fn test_forced_fallback_keeps_existing_image() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Safari", "One.\n\nTwo.");
        h.store.set_page_images(
            story.id,
            vec![None, Some("https://cdn.test/two.jpg".into())],
        );
        h.provider.push_err(ProviderError::RateLimited);
        h.provider.push_err(ProviderError::RateLimited);

        let mut opts = options(story.id, Theme::Safari);
        opts.force_new = true;
        opts.page_index = Some(1);
        let err = h.client.generate("Two.", &opts).await.unwrap_err();
        assert!(matches!(err, ImageGenError::FallbackUsed { .. }));
        assert_eq!(
            h.store.story(story.id).page_images,
            vec![None, Some("https://cdn.test/two.jpg".to_string())]
        );

        // An empty slot still takes the fallback.
        opts.page_index = Some(0);
        h.client.generate("One.", &opts).await.unwrap_err();
        let safari = fallback_image(Some(&Theme::Safari)).to_string();
        assert_eq!(h.store.story(story.id).page_images[0], Some(safari));
    }

    #[tokio::test]
    async fn test_other_provider_errors_propagate_without_writes() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Safari", "One.");
        h.provider.push_err(ProviderError::EmptyImage);

        let err = h
            .client
            .generate("One.", &options(story.id, Theme::Safari))
            .await
            .unwrap_err();

        assert!(matches!(err, ImageGenError::Provider(ProviderError::EmptyImage)));
        assert!(h.store.story(story.id).page_images.is_empty());
    }

    #[tokio::test]
    async fn test_record_write_failure_still_returns_url() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Safari", "One.");
        h.store
            .fail_page_image_writes
            .store(true, std::sync::atomic::Ordering::SeqCst);
        h.provider.push_ok("https://provider.test/a.png");

        let url = h
            .client
            .generate("One.", &options(story.id, Theme::Safari))
            .await
            .unwrap();
        assert!(url.starts_with("mem://"));
    }

    #[tokio::test]
    async fn test_page_index_hint_wins_over_text_match() {
        let h = harness();
        let story = h.store.seed_story(uuid::Uuid::new_v4(), "Safari", "Same.\n\nSame.");
        h.provider.push_ok("https://provider.test/b.png");

        let mut opts = options(story.id, Theme::Safari);
        opts.force_new = true;
        opts.page_index = Some(1);
        let url = h.client.generate("Same.", &opts).await.unwrap();

        assert_eq!(h.store.story(story.id).page_images, vec![None, Some(url)]);
    }

    #[test]
    fn test_sniff_image_type() {
        let png = Bytes::from_static(b"\x89PNG\r\n\x1a\n0000");
        let jpg = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]);
        assert_eq!(sniff_image_type(&png), ("png", "image/png"));
        assert_eq!(sniff_image_type(&jpg), ("jpg", "image/jpeg"));
        assert_eq!(sniff_image_type(&Bytes::from_static(b"??")), ("png", "image/png"));
    }
}
