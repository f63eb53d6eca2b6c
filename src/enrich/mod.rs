// src/enrich/mod.rs
//! Enrichment: parallel full-text fetch, then strictly sequential, throttled summaries.
//! Any per-item failure drops that item; nothing is retried.

pub mod fetch;
pub mod summary;
pub mod throttle;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::ai_adapter::DynCompletion;
use crate::ingest::types::CandidateItem;

pub use fetch::{ContentFetcher, HttpContentFetcher};
pub use summary::{build_summary_prompt, parse_summary};
pub use throttle::{BurstThrottle, ThrottleConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub fetch_workers: usize,
    pub fetch_timeout_secs: u64,
    pub max_content_chars: usize,
    pub throttle: ThrottleConfig,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            fetch_workers: 10,
            fetch_timeout_secs: 15,
            max_content_chars: 8_000,
            throttle: ThrottleConfig::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct EnrichOutcome {
    pub items: Vec<CandidateItem>,
    /// URLs dropped because the body could not be fetched.
    pub fetch_failed: Vec<String>,
    /// URLs dropped because no usable summary came back.
    pub summary_failed: Vec<String>,
}

pub struct EnrichmentPipeline {
    fetcher: Arc<dyn ContentFetcher>,
    completion: DynCompletion,
    cfg: EnrichmentConfig,
}

impl EnrichmentPipeline {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, completion: DynCompletion, cfg: EnrichmentConfig) -> Self {
        Self {
            fetcher,
            completion,
            cfg,
        }
    }

    pub async fn enrich(&self, items: Vec<CandidateItem>) -> EnrichOutcome {
        let mut outcome = EnrichOutcome::default();
        let timeout = Duration::from_secs(self.cfg.fetch_timeout_secs.max(1));

        // 1) bounded parallel fetch, input order restored afterwards
        let mut fetched: Vec<(usize, CandidateItem, anyhow::Result<String>)> =
            stream::iter(items.into_iter().enumerate().map(|(idx, item)| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let res = match tokio::time::timeout(timeout, fetcher.fetch_text(&item.url)).await {
                        Ok(r) => r,
                        Err(_) => Err(anyhow::anyhow!("timed out after {}s", timeout.as_secs())),
                    };
                    (idx, item, res)
                }
            }))
            .buffer_unordered(self.cfg.fetch_workers.max(1))
            .collect()
            .await;
        fetched.sort_by_key(|(idx, _, _)| *idx);

        let mut with_text = Vec::with_capacity(fetched.len());
        for (_, mut item, res) in fetched {
            match res {
                Ok(text) => {
                    item.raw_content = Some(crate::ingest::normalize_text(&text, self.cfg.max_content_chars));
                    with_text.push(item);
                }
                Err(e) => {
                    tracing::warn!(target: "enrich", error = ?e, url = %item.url, "content fetch failed; dropping");
                    counter!("enrich_fetch_failed_total").increment(1);
                    outcome.fetch_failed.push(item.url);
                }
            }
        }

        // 2) sequential summaries behind the burst throttle
        let mut throttle = BurstThrottle::new(&self.cfg.throttle);
        for mut item in with_text {
            throttle.acquire().await;
            let content = item.raw_content.as_deref().unwrap_or_default();
            let prompt = build_summary_prompt(&item, content);
            let parsed = match self.completion.complete_checked(&prompt, &summary_parses).await {
                Ok(reply) => parse_summary(&reply).map_err(anyhow::Error::from),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(summary) => {
                    item.summary = Some(summary);
                    outcome.items.push(item);
                }
                Err(e) => {
                    tracing::warn!(target: "enrich", error = %e, url = %item.url, "summary failed; dropping");
                    counter!("enrich_summary_failed_total").increment(1);
                    outcome.summary_failed.push(item.url);
                }
            }
        }

        tracing::info!(
            target: "enrich",
            kept = outcome.items.len(),
            fetch_failed = outcome.fetch_failed.len(),
            summary_failed = outcome.summary_failed.len(),
            "enrichment done"
        );
        outcome
    }
}

fn summary_parses(reply: &str) -> bool {
    parse_summary(reply).is_ok()
}
