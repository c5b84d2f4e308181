use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Depth exploration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthConfig {
    /// Whether depth probing runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Categories whose runs are depth probed.
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
    /// Accumulated results explored per run, best first.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Depth-derived queries folded back into the run, within what is left
    /// of the follow-up budget.
    #[serde(default = "default_max_depth_queries")]
    pub max_depth_queries: usize,
    /// Upper bound for a page fetch or screenshot, in seconds.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u32,
    /// PDF-to-text proxy; the document URL is appended.
    #[serde(default = "default_pdf_proxy_url")]
    pub pdf_proxy_url: String,
    /// Screenshot service, called as `GET {render_url}?url=<page>`.
    /// Without it no interactive actions are detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_url: Option<String>,
    /// Characters per keyword-anchored window.
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    /// Maximum windows extracted per page.
    #[serde(default = "default_max_windows")]
    pub max_windows: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_categories() -> Vec<Category> {
    vec![Category::ResearchPaper, Category::TechnicalExample]
}

fn default_max_pages() -> usize {
    1
}

fn default_max_depth_queries() -> usize {
    2
}

fn default_page_timeout() -> u32 {
    30
}

fn default_pdf_proxy_url() -> String {
    "https://r.jina.ai/".to_string()
}

fn default_window_chars() -> usize {
    300
}

fn default_max_windows() -> usize {
    5
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            categories: default_categories(),
            max_pages: default_max_pages(),
            max_depth_queries: default_max_depth_queries(),
            page_timeout_secs: default_page_timeout(),
            pdf_proxy_url: default_pdf_proxy_url(),
            render_url: None,
            window_chars: default_window_chars(),
            max_windows: default_max_windows(),
        }
    }
}

impl DepthConfig {
    /// Whether a run of this category should be depth probed.
    pub fn applies_to(&self, category: Category) -> bool {
        self.enabled && self.max_pages > 0 && self.categories.contains(&category)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.page_timeout_secs == 0 {
            return Err("depth.page_timeout_secs must be greater than 0".to_string());
        }
        if !(50..=2000).contains(&self.window_chars) {
            return Err(format!(
                "depth.window_chars must be between 50 and 2000, got {}",
                self.window_chars
            ));
        }
        if self.max_windows == 0 {
            return Err("depth.max_windows must be greater than 0".to_string());
        }
        if self.max_depth_queries > 2 {
            return Err(format!(
                "depth.max_depth_queries must be at most 2, got {}",
                self.max_depth_queries
            ));
        }
        if !self.pdf_proxy_url.starts_with("http") {
            return Err("depth.pdf_proxy_url must be an http(s) URL".to_string());
        }
        Ok(())
    }
}
