//! Mock page fetcher, renderer and action detector for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::brain::BrainError;
use crate::depth::{
    is_pdf_url, ActionDescription, ActionDetection, ActionDetector, FetchError, FetchedPage,
    PageFetcher, PageKind, PageRenderer,
};

/// Which fetch path a call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPath {
    Page,
    Pdf,
}

/// Mock implementation of the PageFetcher trait.
///
/// Pages are served by URL. A `.pdf` URL goes through
/// [`PageFetcher::fetch_pdf_text`] just like the HTTP fetcher, so tests can
/// assert which path was taken.
#[derive(Default)]
pub struct MockPageFetcher {
    pages: Arc<RwLock<HashMap<String, FetchedPage>>>,
    pdf_texts: Arc<RwLock<HashMap<String, String>>>,
    calls: Arc<RwLock<Vec<(FetchPath, String)>>>,
    delay: Arc<RwLock<Option<Duration>>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` at its URL.
    pub async fn add_page(&self, page: FetchedPage) {
        self.pages.write().await.insert(page.url.clone(), page);
    }

    /// Serve `text` as the extracted text of the PDF at `url`.
    pub async fn add_pdf(&self, url: &str, text: &str) {
        self.pdf_texts
            .write()
            .await
            .insert(url.to_string(), text.to_string());
    }

    /// Delay every fetch by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Recorded calls as (path, url).
    pub async fn calls(&self) -> Vec<(FetchPath, String)> {
        self.calls.read().await.clone()
    }

    async fn wait(&self) {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if is_pdf_url(url) {
            let text = self.fetch_pdf_text(url).await?;
            return Ok(FetchedPage {
                url: url.to_string(),
                kind: PageKind::Pdf,
                title: String::new(),
                text,
                links: Vec::new(),
            });
        }

        self.calls
            .write()
            .await
            .push((FetchPath::Page, url.to_string()));
        self.wait().await;

        self.pages
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }

    async fn fetch_pdf_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls
            .write()
            .await
            .push((FetchPath::Pdf, url.to_string()));
        self.wait().await;

        self.pdf_texts
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}

/// Mock renderer returning fixed bytes, or unavailable when none are set.
#[derive(Default)]
pub struct MockRenderer {
    image: Arc<RwLock<Option<Vec<u8>>>>,
    screenshots: Arc<RwLock<Vec<String>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer that always returns `image`.
    pub fn with_image(image: Vec<u8>) -> Self {
        Self {
            image: Arc::new(RwLock::new(Some(image))),
            screenshots: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// URLs screenshotted so far.
    pub async fn screenshots(&self) -> Vec<String> {
        self.screenshots.read().await.clone()
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn screenshot(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.screenshots.write().await.push(url.to_string());
        self.image
            .read()
            .await
            .clone()
            .ok_or_else(|| FetchError::Unavailable("mock renderer has no image".to_string()))
    }
}

/// Mock action detector answering with a fixed action.
#[derive(Default)]
pub struct MockActionDetector {
    action: Arc<RwLock<Option<String>>>,
    calls: Arc<RwLock<usize>>,
}

impl MockActionDetector {
    /// Detector that never finds an action.
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector that always reports `action`.
    pub fn with_action(action: &str) -> Self {
        Self {
            action: Arc::new(RwLock::new(Some(action.to_string()))),
            calls: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn call_count(&self) -> usize {
        *self.calls.read().await
    }
}

#[async_trait]
impl ActionDetector for MockActionDetector {
    async fn detect_required_action(
        &self,
        _image: &[u8],
        _query: &str,
    ) -> Result<ActionDetection, BrainError> {
        *self.calls.write().await += 1;
        Ok(ActionDetection {
            action: self
                .action
                .read()
                .await
                .clone()
                .map(|description| ActionDescription { description }),
            usage: Default::default(),
        })
    }
}
