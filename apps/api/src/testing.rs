//! Test doubles for the provider, object store and image fetcher.

use std::collections::{HashSet, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Notify, Semaphore};

use crate::image_client::{ImageProvider, ProviderError};
use crate::storage::{ImageFetcher, ObjectStore, StorageError};

/// Provider that replays queued results, then succeeds with generated URLs.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
    successful: Mutex<Vec<String>>,
    calls: AtomicUsize,
    called: Notify,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

/// Releases a provider blocked by `ScriptedProvider::hold`.
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn release(&self) {
        self.0.add_permits(1024);
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, url: &str) {
        self.script.lock().unwrap().push_back(Ok(url.to_string()));
    }

    pub fn push_err(&self, err: ProviderError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn successful_prompts(&self) -> Vec<String> {
        self.successful.lock().unwrap().clone()
    }

    /// Blocks every call until the returned gate is released.
    pub fn hold(&self) -> Gate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(semaphore.clone());
        Gate(semaphore)
    }

    pub async fn wait_until_called(&self) {
        self.called.notified().await;
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.called.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }

        let next = self.script.lock().unwrap().pop_front();
        let result = next.unwrap_or_else(|| Ok(format!("https://provider.test/auto-{n}.png")));
        if result.is_ok() {
            self.successful.lock().unwrap().push(prompt.to_string());
        }
        result
    }
}

/// Object store that keeps uploads in memory and hands out `mem://` URLs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<Vec<(String, Bytes, String)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Public URLs in upload order.
    pub fn urls(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _, _)| url.clone())
            .collect()
    }

    pub fn get(&self, url: &str) -> Option<(Bytes, String)> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _, _)| u == url)
            .map(|(_, body, content_type)| (body.clone(), content_type.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = format!("mem://{bucket}/{key}");
        self.objects
            .lock()
            .unwrap()
            .push((url.clone(), body, content_type.to_string()));
        Ok(url)
    }
}

/// Serves a small PNG for every URL except those marked broken.
pub struct FakeFetcher {
    png: Bytes,
    broken: Mutex<HashSet<String>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            png: sample_png(),
            broken: Mutex::new(HashSet::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn break_url(&self, url: &str) {
        self.broken.lock().unwrap().insert(url.to_string());
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, StorageError> {
        self.fetched.lock().unwrap().push(url.to_string());
        if self.broken.lock().unwrap().contains(url) {
            return Err(StorageError::Fetch {
                url: url.to_string(),
                message: "HTTP 404 Not Found".to_string(),
            });
        }
        if url.ends_with(".garbage") {
            return Ok(Bytes::from_static(b"definitely not an image"));
        }
        Ok(self.png.clone())
    }
}

/// 8x6 solid-colour PNG.
pub fn sample_png() -> Bytes {
    let img = image::RgbImage::from_pixel(8, 6, image::Rgb([200, 120, 40]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    Bytes::from(buf)
}
