// Export renderer: cover + one page per story page, assembled into a PDF,
// uploaded to the PDF bucket and recorded back on the story.

pub mod handlers;
pub mod pdf;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::layout::EXPORT_PAGE;
use crate::models::story::StoryRow;
use crate::pagination::Page;
use crate::storage::paths::export_path;
use crate::storage::{ImageFetcher, ObjectStore, StorageError};
use crate::store::{StoreError, StoryStore};

use pdf::{render_document, Sheet};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("PDF rendering failed: {0}")]
    Render(String),
}

pub struct ExportRenderer {
    store: Arc<dyn StoryStore>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn ImageFetcher>,
    pdf_bucket: String,
}

impl ExportRenderer {
    pub fn new(
        store: Arc<dyn StoryStore>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn ImageFetcher>,
        pdf_bucket: String,
    ) -> Self {
        Self {
            store,
            objects,
            fetcher,
            pdf_bucket,
        }
    }

    /// Returns the story's export URL, rendering and uploading one first if
    /// no confirmed export exists.
    pub async fn export(&self, story: &StoryRow, pages: &[Page]) -> Result<String, ExportError> {
        if let Some(url) = story.confirmed_export() {
            info!(story_id = %story.id, "Reusing existing export");
            return Ok(url.to_string());
        }

        let sheets = self.build_sheets(story.id, &story.title(), pages).await;
        let page_count = sheets.len();
        let bytes = tokio::task::spawn_blocking(move || render_document(&EXPORT_PAGE, &sheets))
            .await
            .map_err(|e| ExportError::Render(format!("render task failed: {e}")))??;

        let key = export_path(story.id, Utc::now().timestamp_millis());
        let size = bytes.len();
        let url = self
            .objects
            .put(&self.pdf_bucket, &key, Bytes::from(bytes), "application/pdf")
            .await?;
        self.store.set_export(story.id, Some(&url)).await?;

        info!(story_id = %story.id, pages = page_count, bytes = size, "Story exported");
        Ok(url)
    }

    /// Clears the export so the next `export` renders a fresh document.
    pub async fn invalidate(&self, story_id: Uuid) -> Result<(), ExportError> {
        self.store.set_export(story_id, None).await?;
        info!(%story_id, "Export invalidated");
        Ok(())
    }

    /// Cover first (title + first page's image), then every page. Image
    /// fetch failures leave that sheet text-only.
    async fn build_sheets(&self, story_id: Uuid, title: &str, pages: &[Page]) -> Vec<Sheet> {
        let mut fetched: HashMap<String, Option<Bytes>> = HashMap::new();
        let total = pages.len();
        let mut sheets = Vec::with_capacity(total + 1);

        let cover_image = match pages.first().and_then(|p| p.image_url.as_deref()) {
            Some(url) => self.load_image(story_id, 0, url, &mut fetched).await,
            None => None,
        };
        sheets.push(Sheet {
            text: title.to_string(),
            footer: format!("Page 0 of {}", total + 1),
            image: cover_image,
        });

        for page in pages {
            let image = match page.image_url.as_deref() {
                Some(url) => self.load_image(story_id, page.number, url, &mut fetched).await,
                None => None,
            };
            sheets.push(Sheet {
                text: page.text.clone(),
                footer: format!("Page {} of {}", page.number, total),
                image,
            });
        }
        sheets
    }

    async fn load_image(
        &self,
        story_id: Uuid,
        page: usize,
        url: &str,
        fetched: &mut HashMap<String, Option<Bytes>>,
    ) -> Option<Bytes> {
        if let Some(cached) = fetched.get(url) {
            return cached.clone();
        }
        let result = match self.fetcher.fetch(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(%story_id, page, error = %e, "Export image failed to load; page will be text only");
                None
            }
        };
        fetched.insert(url.to_string(), result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::build_pages;
    use crate::store::memory::MemoryStoryStore;
    use crate::testing::{FakeFetcher, MemoryObjectStore};
    use lopdf::content::Content;
    use lopdf::{Document, Object};
    use std::sync::atomic::Ordering;

    struct Harness {
        store: Arc<MemoryStoryStore>,
        objects: Arc<MemoryObjectStore>,
        fetcher: Arc<FakeFetcher>,
        renderer: ExportRenderer,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStoryStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let fetcher = Arc::new(FakeFetcher::new());
        let renderer = ExportRenderer::new(
            store.clone(),
            objects.clone(),
            fetcher.clone(),
            "story-pdfs".to_string(),
        );
        Harness {
            store,
            objects,
            fetcher,
            renderer,
        }
    }

    fn page_texts(doc: &Document, page_number: u32) -> (Vec<String>, bool) {
        let page_id = doc.get_pages()[&page_number];
        let ops = Content::decode(&doc.get_page_content(page_id).unwrap())
            .unwrap()
            .operations;
        let texts = ops
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match &op.operands[0] {
                Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect();
        let has_image = ops.iter().any(|op| op.operator == "Do");
        (texts, has_image)
    }

    #[tokio::test]
    async fn test_export_renders_cover_plus_pages_and_records_url() {
        let h = harness();
        let story = h.store.seed_story(Uuid::new_v4(), "safari", "One.\n\nTwo.\n\nThree.");
        h.store.set_page_images(
            story.id,
            vec![Some("https://cdn.test/1.png".into()), None, Some("https://cdn.test/3.png".into())],
        );
        let story = h.store.story(story.id);
        let pages = build_pages(&story.content, &story.page_images);

        let url = h.renderer.export(&story, &pages).await.unwrap();

        assert!(url.starts_with(&format!("mem://story-pdfs/{}/", story.id)));
        assert!(url.ends_with(".pdf"));
        let saved = h.store.story(story.id);
        assert!(saved.has_pdf);
        assert_eq!(saved.pdf_url.as_deref(), Some(url.as_str()));

        let (bytes, content_type) = h.objects.get(&url).unwrap();
        assert_eq!(content_type, "application/pdf");
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 4);

        let (cover, cover_image) = page_texts(&doc, 1);
        assert!(cover.contains(&"Mia's Safari Adventure".to_string()));
        assert!(cover.contains(&"Page 0 of 4".to_string()));
        assert!(cover_image);

        let (second, second_image) = page_texts(&doc, 3);
        assert!(second.contains(&"Two.".to_string()));
        assert!(second.contains(&"Page 2 of 3".to_string()));
        assert!(!second_image);

        // Cover and page 1 share an image; it is fetched once.
        assert_eq!(
            h.fetcher.fetched(),
            vec!["https://cdn.test/1.png".to_string(), "https://cdn.test/3.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_export_reuses_confirmed_artifact() {
        let h = harness();
        let story = h.store.seed_story(Uuid::new_v4(), "adventure", "One.\n\nTwo.");
        let pages = build_pages(&story.content, &story.page_images);

        let first = h.renderer.export(&story, &pages).await.unwrap();
        let story = h.store.story(story.id);
        let second = h.renderer.export(&story, &pages).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.objects.len(), 1);
        assert_eq!(h.store.export_writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broken_image_degrades_page_without_aborting() {
        let h = harness();
        let story = h.store.seed_story(Uuid::new_v4(), "kindness", "One.\n\nTwo.\n\nThree.");
        h.store.set_page_images(
            story.id,
            vec![
                Some("https://cdn.test/1.png".into()),
                Some("https://cdn.test/missing.png".into()),
                Some("https://cdn.test/3.garbage".into()),
            ],
        );
        h.fetcher.break_url("https://cdn.test/missing.png");
        let story = h.store.story(story.id);
        let pages = build_pages(&story.content, &story.page_images);

        let url = h.renderer.export(&story, &pages).await.unwrap();

        let (bytes, _) = h.objects.get(&url).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 4);

        let (texts, has_image) = page_texts(&doc, 3);
        assert!(texts.contains(&"Two.".to_string()));
        assert!(texts.contains(&"Page 2 of 3".to_string()));
        assert!(!has_image);

        let (texts, has_image) = page_texts(&doc, 4);
        assert!(texts.contains(&"Three.".to_string()));
        assert!(!has_image);

        let (_, has_image) = page_texts(&doc, 2);
        assert!(has_image);
    }

    #[tokio::test]
    async fn test_long_page_still_carries_page_number() {
        let h = harness();
        let long = "The little fox kept walking through the tall grass. ".repeat(120);
        let content = format!("Short start.\n\n{}\n\nThe end.", long.trim());
        let story = h.store.seed_story(Uuid::new_v4(), "adventure", &content);
        h.store.set_page_images(
            story.id,
            vec![None, Some("https://cdn.test/2.png".into()), None],
        );
        let story = h.store.story(story.id);
        let pages = build_pages(&story.content, &story.page_images);

        let url = h.renderer.export(&story, &pages).await.unwrap();

        let (bytes, _) = h.objects.get(&url).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 4);

        let (texts, has_image) = page_texts(&doc, 3);
        assert!(has_image);
        assert!(texts.len() > 10, "body should fill the page");
        assert_eq!(texts.last().map(String::as_str), Some("Page 2 of 3"));

        let (texts, _) = page_texts(&doc, 4);
        assert!(texts.contains(&"Page 3 of 3".to_string()));
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_render() {
        let h = harness();
        let story = h.store.seed_story(Uuid::new_v4(), "friendship", "Only page.");
        let pages = build_pages(&story.content, &story.page_images);

        h.renderer.export(&story, &pages).await.unwrap();
        h.renderer.invalidate(story.id).await.unwrap();
        let story = h.store.story(story.id);
        assert!(!story.has_pdf);
        assert!(story.pdf_url.is_none());

        h.renderer.export(&story, &pages).await.unwrap();
        assert_eq!(h.objects.len(), 2);
    }
}
