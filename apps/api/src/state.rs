use std::sync::Arc;

use crate::config::Config;
use crate::export::ExportRenderer;
use crate::illustration::{ImageGenerationClient, PageImageSynchronizer};
use crate::storage::ObjectStore;
use crate::store::StoryStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoryStore>,
    pub objects: Arc<dyn ObjectStore>,
    /// Generation client shared with the synchronizer; used directly for covers.
    pub images: Arc<ImageGenerationClient>,
    /// Owns the per-story attempt table and single-flight locks.
    pub sync: Arc<PageImageSynchronizer>,
    pub exports: Arc<ExportRenderer>,
    pub config: Config,
}
