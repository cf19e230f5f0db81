// Illustrations: generation client, fallback table, similarity helper,
// page-image synchronizer and the per-story attempt table.

pub mod attempts;
pub mod client;
pub mod fallback;
pub mod handlers;
pub mod similarity;
pub mod sync;

use thiserror::Error;

use crate::image_client::ProviderError;
use crate::storage::StorageError;
use crate::store::StoreError;

pub use attempts::{AttemptStatus, AttemptTable, GenerationAttempt};
pub use client::{GenerateOptions, ImageGenerationClient};
pub use sync::PageImageSynchronizer;

/// Soft notice shown when a fallback illustration stands in for a generated one.
pub const FALLBACK_NOTICE: &str =
    "Image generation is temporarily unavailable. Showing an alternative illustration instead.";

#[derive(Debug, Error)]
pub enum ImageGenError {
    /// Quota-limited provider; `url` is the fallback already recorded on the story.
    #[error("{}", FALLBACK_NOTICE)]
    FallbackUsed { url: String, cause: ProviderError },

    #[error(transparent)]
    Provider(ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImageGenError {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageGenError::FallbackUsed { cause, .. } => cause.kind(),
            ImageGenError::Provider(e) => e.kind(),
            ImageGenError::Storage(_) => "storage_error",
            ImageGenError::Store(_) => "store_error",
        }
    }
}
