// src/ingest/mod.rs
pub mod providers;
pub mod types;

use crate::ingest::types::{CandidateItem, Category, SearchHints, SourceProvider};
use anyhow::anyhow;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Raw items returned by sources.");
        describe_counter!(
            "ingest_kept_total",
            "Items kept after normalization and the recency filter."
        );
        describe_counter!(
            "ingest_filtered_total",
            "Items dropped as empty, stale or over the source budget."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch failures and timeouts."
        );
        describe_histogram!("ingest_source_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when aggregation last completed."
        );
    });
}

/// Normalize text: decode entities, strip tags, ASCII quotes, collapse whitespace, cap length.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }

    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Bounded worker pool size for concurrent source fetches.
    pub workers: usize,
    pub request_timeout_secs: u64,
    /// Overall number of raw items the run aims to gather.
    pub total_items: usize,
    pub category_floor: usize,
    pub per_source_floor: usize,
    pub over_fetch: usize,
    pub max_age_days: i64,
    pub title_max_chars: usize,
    pub description_max_chars: usize,
    /// Share of the item budget per category before the model has learned one.
    pub default_distribution: BTreeMap<Category, f64>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            request_timeout_secs: 15,
            total_items: 30,
            category_floor: 5,
            per_source_floor: 8,
            over_fetch: 3,
            max_age_days: 2,
            title_max_chars: 300,
            description_max_chars: 600,
            default_distribution: BTreeMap::from([
                (Category::Ai, 0.45),
                (Category::Finance, 0.35),
                (Category::Politics, 0.20),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub budget: usize,
    pub kept: usize,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub items: Vec<CandidateItem>,
    pub sources: Vec<SourceReport>,
}

impl AggregateOutcome {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Fans out to every configured source with a bounded pool; a failing source contributes nothing.
pub struct SourceAggregator {
    sources: Vec<Arc<dyn SourceProvider>>,
    cfg: AggregatorConfig,
}

impl SourceAggregator {
    pub fn new(sources: Vec<Arc<dyn SourceProvider>>, cfg: AggregatorConfig) -> Self {
        Self { sources, cfg }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Item budget per source, in source order.
    pub fn source_budgets(&self, distribution: &BTreeMap<Category, f64>) -> Vec<usize> {
        let mut per_category: HashMap<Category, usize> = HashMap::new();
        for s in &self.sources {
            *per_category
                .entry(s.category().unwrap_or(Category::Other))
                .or_default() += 1;
        }

        self.sources
            .iter()
            .map(|s| {
                let cat = s.category().unwrap_or(Category::Other);
                let share = distribution
                    .get(&cat)
                    .or_else(|| self.cfg.default_distribution.get(&cat))
                    .copied()
                    .unwrap_or(0.0)
                    .clamp(0.0, 1.0);
                let target = self
                    .cfg
                    .category_floor
                    .max((self.cfg.total_items as f64 * share).round() as usize);
                let n = per_category.get(&cat).copied().unwrap_or(1).max(1);
                self.cfg.per_source_floor.max(target / n + self.cfg.over_fetch)
            })
            .collect()
    }

    pub async fn collect(
        &self,
        distribution: &BTreeMap<Category, f64>,
        hints: &SearchHints,
        now: DateTime<Utc>,
    ) -> AggregateOutcome {
        ensure_metrics_described();

        let budgets = self.source_budgets(distribution);
        let timeout = Duration::from_secs(self.cfg.request_timeout_secs.max(1));

        let futs: Vec<_> = self
            .sources
            .iter()
            .cloned()
            .zip(budgets)
            .enumerate()
            .map(|(idx, (source, budget))| {
                let hints = hints.clone();
                async move {
                    let t0 = std::time::Instant::now();
                    let res = match tokio::time::timeout(timeout, source.fetch(budget, &hints)).await {
                        Ok(r) => r,
                        Err(_) => Err(anyhow!("timed out after {}s", timeout.as_secs())),
                    };
                    histogram!("ingest_source_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                    (idx, budget, res)
                }
            })
            .collect();

        let mut fetched: Vec<_> = stream::iter(futs)
            .buffer_unordered(self.cfg.workers.max(1))
            .collect()
            .await;

        // Deterministic output order regardless of completion order.
        fetched.sort_by_key(|(idx, _, _)| *idx);

        let cutoff = now - ChronoDuration::days(self.cfg.max_age_days.max(0));
        let mut outcome = AggregateOutcome::default();

        for (idx, budget, res) in fetched {
            let source = &self.sources[idx];
            match res {
                Ok(raw) => {
                    counter!("ingest_items_total").increment(raw.len() as u64);
                    let raw_len = raw.len();
                    let kept: Vec<CandidateItem> = raw
                        .into_iter()
                        .filter_map(|it| self.normalize_item(it, now))
                        .filter(|it| it.published_at >= cutoff)
                        .take(budget)
                        .collect();
                    counter!("ingest_filtered_total").increment((raw_len - kept.len()) as u64);
                    tracing::info!(
                        target: "ingest",
                        source = source.name(),
                        budget,
                        raw = raw_len,
                        kept = kept.len(),
                        "source fetched"
                    );
                    outcome.sources.push(SourceReport {
                        source: source.name().to_string(),
                        budget,
                        kept: kept.len(),
                        error: None,
                    });
                    outcome.items.extend(kept);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = ?e, source = source.name(), "source failed; contributing zero items");
                    counter!("ingest_source_errors_total").increment(1);
                    outcome.sources.push(SourceReport {
                        source: source.name().to_string(),
                        budget,
                        kept: 0,
                        error: Some(format!("{e:#}")),
                    });
                }
            }
        }

        counter!("ingest_kept_total").increment(outcome.items.len() as u64);
        gauge!("ingest_last_run_ts").set(now.timestamp() as f64);
        outcome
    }

    fn normalize_item(&self, mut it: CandidateItem, now: DateTime<Utc>) -> Option<CandidateItem> {
        it.title = normalize_text(&it.title, self.cfg.title_max_chars);
        it.description = normalize_text(&it.description, self.cfg.description_max_chars);
        it.url = it.url.trim().to_string();
        it.source = it.source.trim().to_string();
        if it.title.is_empty() || it.url.is_empty() {
            return None;
        }
        if it.published_at > now {
            it.published_at = now;
        }
        // `Other` doubles as "untagged"; keyword classification may still place it
        if it.category == Category::Other {
            it.category = crate::keywords::classify(&format!("{} {}", it.title, it.description));
        }
        Some(it)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_ws_and_entities() {
        let s = "  Hello,&nbsp;&nbsp; <b>world</b>!  ";
        assert_eq!(normalize_text(s, 100), "Hello, world !");
    }

    #[test]
    fn normalize_text_caps_length() {
        let s = "abcdefghij";
        assert_eq!(normalize_text(s, 4), "abcd");
    }

    struct Tagged(Category);

    #[async_trait::async_trait]
    impl SourceProvider for Tagged {
        async fn fetch(&self, _max: usize, _h: &SearchHints) -> anyhow::Result<Vec<CandidateItem>> {
            Ok(vec![])
        }
        fn name(&self) -> &str {
            "tagged"
        }
        fn category(&self) -> Option<Category> {
            Some(self.0)
        }
    }

    #[test]
    fn budgets_split_category_target_across_sources() {
        let sources: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(Tagged(Category::Ai)),
            Arc::new(Tagged(Category::Ai)),
            Arc::new(Tagged(Category::Finance)),
        ];
        let cfg = AggregatorConfig {
            total_items: 40,
            per_source_floor: 2,
            over_fetch: 1,
            ..Default::default()
        };
        let agg = SourceAggregator::new(sources, cfg);
        let dist = BTreeMap::from([(Category::Ai, 0.5), (Category::Finance, 0.25)]);
        // ai: 20 / 2 + 1 = 11 each; finance: 10 / 1 + 1 = 11
        assert_eq!(agg.source_budgets(&dist), vec![11, 11, 11]);
    }
}
