// src/dedup.rs
//! Multi-signal deduplication: exact URL, normalized URL path, title prefix.
//! Any single matching signal drops the candidate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ingest::types::CandidateItem;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub title_prefix_chars: usize,
    /// Normalized paths shorter than this are not used as a signal ("/", "/news").
    pub min_path_len: usize,
    /// How many prior days of batches seed the index.
    pub history_days: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_prefix_chars: 25,
            min_path_len: 10,
            history_days: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupSignal {
    Url,
    Path,
    TitlePrefix,
}

/// `https://a.com/x/y/?q=1#f` → `/x/y`. `None` when the URL does not parse.
pub fn normalized_path(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    Some(url.path().trim_end_matches('/').to_string())
}

pub fn title_prefix(title: &str, k: usize) -> String {
    title.trim().chars().take(k).collect::<String>().trim().to_string()
}

/// Seen-sets for one run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    urls: HashSet<String>,
    paths: HashSet<String>,
    titles: HashSet<String>,
    cfg: DedupConfig,
}

impl DedupIndex {
    pub fn new(cfg: DedupConfig) -> Self {
        Self {
            cfg,
            ..Default::default()
        }
    }

    pub fn seed<'a>(&mut self, history: impl IntoIterator<Item = &'a CandidateItem>) {
        for it in history {
            self.insert(it);
        }
    }

    fn path_key(&self, url: &str) -> Option<String> {
        normalized_path(url).filter(|p| p.chars().count() >= self.cfg.min_path_len)
    }

    fn title_key(&self, title: &str) -> Option<String> {
        Some(title_prefix(title, self.cfg.title_prefix_chars)).filter(|t| !t.is_empty())
    }

    /// First signal that matches an already-seen item, checked in URL, path, title order.
    pub fn check(&self, it: &CandidateItem) -> Option<DedupSignal> {
        if self.urls.contains(it.url.trim()) {
            return Some(DedupSignal::Url);
        }
        if self.path_key(&it.url).is_some_and(|p| self.paths.contains(&p)) {
            return Some(DedupSignal::Path);
        }
        if self.title_key(&it.title).is_some_and(|t| self.titles.contains(&t)) {
            return Some(DedupSignal::TitlePrefix);
        }
        None
    }

    pub fn insert(&mut self, it: &CandidateItem) {
        self.urls.insert(it.url.trim().to_string());
        if let Some(p) = self.path_key(&it.url) {
            self.paths.insert(p);
        }
        if let Some(t) = self.title_key(&it.title) {
            self.titles.insert(t);
        }
    }

    /// Check and, when new, insert. Returns the matching signal for duplicates.
    pub fn admit(&mut self, it: &CandidateItem) -> Result<(), DedupSignal> {
        match self.check(it) {
            Some(sig) => Err(sig),
            None => {
                self.insert(it);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub kept: Vec<CandidateItem>,
    pub dropped_url: usize,
    pub dropped_path: usize,
    pub dropped_title: usize,
}

impl DedupOutcome {
    pub fn dropped(&self) -> usize {
        self.dropped_url + self.dropped_path + self.dropped_title
    }
}

/// Dedup `candidates` against `history` and against each other, keeping first occurrences.
pub fn dedup(
    candidates: Vec<CandidateItem>,
    history: &[CandidateItem],
    cfg: &DedupConfig,
) -> DedupOutcome {
    let mut index = DedupIndex::new(cfg.clone());
    index.seed(history);

    let mut out = DedupOutcome::default();
    for it in candidates {
        match index.admit(&it) {
            Ok(()) => out.kept.push(it),
            Err(DedupSignal::Url) => out.dropped_url += 1,
            Err(DedupSignal::Path) => out.dropped_path += 1,
            Err(DedupSignal::TitlePrefix) => out.dropped_title += 1,
        }
    }
    tracing::info!(
        target: "dedup",
        kept = out.kept.len(),
        url = out.dropped_url,
        path = out.dropped_path,
        title = out.dropped_title,
        history = history.len(),
        "dedup done"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_normalization() {
        assert_eq!(
            normalized_path("https://a.example/2026/10/story/?utm=x#top").as_deref(),
            Some("/2026/10/story")
        );
        assert_eq!(normalized_path("http://b.example/").as_deref(), Some(""));
        assert!(normalized_path("not a url").is_none());
    }

    #[test]
    fn title_prefix_trims_both_ends() {
        assert_eq!(title_prefix("  Short title ", 25), "Short title");
        assert_eq!(title_prefix("abcdefghij klm", 11), "abcdefghij");
    }
}
