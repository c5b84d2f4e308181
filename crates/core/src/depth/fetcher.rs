//! Page fetching and HTML text/link extraction.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors from fetching or rendering a page.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("No extractable content")]
    Empty,

    #[error("Not available: {0}")]
    Unavailable(String),
}

/// What kind of document a page turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Html,
    Pdf,
}

/// An outgoing link on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLink {
    pub label: String,
    /// Absolute URL.
    pub url: String,
}

/// A fetched page reduced to visible text and outgoing links.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub kind: PageKind,
    pub title: String,
    pub text: String,
    /// Empty for PDFs.
    pub links: Vec<PageLink>,
}

/// Retrieves page content for depth exploration.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page. PDFs are routed through [`PageFetcher::fetch_pdf_text`].
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Plain text of a PDF document.
    async fn fetch_pdf_text(&self, url: &str) -> Result<String, FetchError>;
}

/// True when the URL path ends in `.pdf`.
pub fn is_pdf_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase().ends_with(".pdf"),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .map(|p| p.to_lowercase().ends_with(".pdf"))
            .unwrap_or(false),
    }
}

const BOILERPLATE: &str = "script, style, noscript, nav, footer, header, aside, svg, iframe";

/// Parse an HTML document into visible text and absolute links.
pub fn parse_html(html: &str, page_url: &str) -> FetchedPage {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let title = Selector::parse("title")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(|el| collapse(&el.text().collect::<String>()))
        .unwrap_or_default();

    let links = match Selector::parse("a[href]") {
        Ok(selector) => document
            .select(&selector)
            .filter_map(|a| {
                let href = a.value().attr("href")?.trim();
                if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                    return None;
                }
                let url = match &base {
                    Some(base) => base.join(href).ok()?,
                    None => Url::parse(href).ok()?,
                };
                if !matches!(url.scheme(), "http" | "https") {
                    return None;
                }
                let label = collapse(&a.text().collect::<String>());
                let label = if label.is_empty() {
                    a.value()
                        .attr("aria-label")
                        .or_else(|| a.value().attr("title"))
                        .map(collapse)
                        .unwrap_or_default()
                } else {
                    label
                };
                Some(PageLink {
                    label,
                    url: url.to_string(),
                })
            })
            .collect(),
        Err(_) => Vec::new(),
    };

    FetchedPage {
        url: page_url.to_string(),
        kind: PageKind::Html,
        title,
        text: visible_text(&document),
        links,
    }
}

/// Text of the main content area with boilerplate elements left out.
fn visible_text(document: &Html) -> String {
    let skip = Selector::parse(BOILERPLATE).ok();
    let skipped: std::collections::HashSet<_> = match &skip {
        Some(selector) => document.select(selector).map(|el| el.id()).collect(),
        None => Default::default(),
    };

    for candidate in ["article", "main", "[role=\"main\"]", "body"] {
        let Ok(selector) = Selector::parse(candidate) else {
            continue;
        };
        let Some(root) = document.select(&selector).next() else {
            continue;
        };

        let mut parts = Vec::new();
        for node in root.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node
                .ancestors()
                .any(|ancestor| skipped.contains(&ancestor.id()));
            if !hidden {
                parts.push(&*text.text);
            }
        }

        let text = collapse(&parts.join(" "));
        if !text.is_empty() {
            return text;
        }
    }

    String::new()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fetches pages over HTTP with reqwest; PDFs go through a text proxy.
pub struct HttpPageFetcher {
    client: Client,
    pdf_proxy_url: String,
    timeout: Duration,
}

impl HttpPageFetcher {
    pub fn new(pdf_proxy_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; autosearch/0.1)")
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self {
            client,
            pdf_proxy_url: pdf_proxy_url.into(),
            timeout,
        })
    }

    fn map_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(e.to_string())
        }
    }

    async fn pdf_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let text = self.fetch_pdf_text(url).await?;
        let title = url
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .trim_end_matches(".pdf")
            .to_string();
        Ok(FetchedPage {
            url: url.to_string(),
            kind: PageKind::Pdf,
            title,
            text,
            links: Vec::new(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        if is_pdf_url(url) {
            return self.pdf_page(url).await;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let is_pdf = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_lowercase().contains("application/pdf"))
            .unwrap_or(false);
        if is_pdf {
            return self.pdf_page(url).await;
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| self.map_err(e))?;
        let page = parse_html(&html, &final_url);
        debug!(url = %final_url, chars = page.text.len(), links = page.links.len(), "Fetched page");

        if page.text.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(page)
    }

    async fn fetch_pdf_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(format!("{}{}", self.pdf_proxy_url, url))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let text = collapse(&response.text().await.map_err(|e| self.map_err(e))?);
        if text.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(text)
    }
}
