//! Depth exploration of individual result pages.
//!
//! A page is fetched (PDFs through a text proxy), optionally screenshotted to
//! detect a required interaction such as "View PDF", followed if needed, and
//! cut into keyword-anchored windows from which two follow-up queries are
//! synthesized.

mod config;
mod explorer;
mod extract;
mod fetcher;
mod vision;

pub use config::DepthConfig;
pub use explorer::{fallback_link_match, fallback_queries, DepthExplorer, Exploration, RefinedQueries};
pub use extract::extract_windows;
pub use fetcher::{
    is_pdf_url, parse_html, FetchError, FetchedPage, HttpPageFetcher, PageFetcher, PageKind,
    PageLink,
};
pub use vision::{
    ActionDescription, ActionDetection, ActionDetector, HttpRenderer, LlmActionDetector,
    NoRenderer, PageRenderer,
};
