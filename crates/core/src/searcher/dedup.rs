//! Accumulated, identity-deduplicated result set for one run.

use std::collections::HashSet;

use super::SearchResult;

/// Dedup identity of a result: lowercased, trimmed title and link joined by
/// `|`, with trailing slashes removed from the link.
pub fn result_identity(result: &SearchResult) -> String {
    let title = result.title.trim().to_lowercase();
    let link = result.link.trim().to_lowercase();
    format!("{}|{}", title, link.trim_end_matches('/'))
}

/// Results accepted so far in a run, unique by [`result_identity`].
///
/// Insertion order is kept; the first entries are the earliest accepted and
/// are treated as the top-ranked ones.
#[derive(Debug, Default, Clone)]
pub struct ResultSet {
    entries: Vec<SearchResult>,
    seen: HashSet<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one result. Returns false if its identity was already present.
    pub fn insert(&mut self, result: SearchResult) -> bool {
        if self.seen.insert(result_identity(&result)) {
            self.entries.push(result);
            true
        } else {
            false
        }
    }

    /// Merge a batch and return the entries that were new.
    ///
    /// Duplicates within the batch itself are collapsed as well.
    pub fn add_unique(&mut self, batch: Vec<SearchResult>) -> Vec<SearchResult> {
        batch
            .into_iter()
            .filter(|r| self.insert(r.clone()))
            .collect()
    }

    pub fn contains(&self, result: &SearchResult) -> bool {
        self.seen.contains(&result_identity(result))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchResult> {
        self.entries.iter()
    }

    /// The first `n` accepted results.
    pub fn top(&self, n: usize) -> &[SearchResult] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn into_vec(self) -> Vec<SearchResult> {
        self.entries
    }
}
