// src/bootstrap.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::ai_adapter::build_client_from_config;
use crate::config::{PipelineConfig, RankingMode};
use crate::enrich::{EnrichmentPipeline, HttpContentFetcher};
use crate::error::PipelineError;
use crate::ingest::providers::build_sources;
use crate::ingest::SourceAggregator;
use crate::legacy::LegacyDigest;
use crate::pipeline::{local_date, CuratorPipeline, RunMode};
use crate::select::{CompletionRanker, PreferenceRanker, Ranker};
use crate::store::{DocumentStore, FsStore};

/// Something that can execute one run; the HTTP surface depends only on this.
#[async_trait::async_trait]
pub trait RunTrigger: Send + Sync {
    /// Human-readable result message on success.
    async fn trigger(&self, mode: RunMode, now: DateTime<Utc>) -> Result<String, PipelineError>;
}

/// Everything a process needs to serve runs, built once from config.
pub struct CuratorRuntime {
    utc_offset_hours: i32,
    pipeline: CuratorPipeline,
    legacy: LegacyDigest,
}

impl CuratorRuntime {
    /// Resolves every credential up front: a missing key fails here, before any side effect.
    pub fn from_config(cfg: PipelineConfig) -> Result<Self, PipelineError> {
        info!(
            provider = %cfg.completion.provider,
            enabled = cfg.completion.enabled,
            sources = cfg.sources.len(),
            ranking = ?cfg.ranking,
            store = %cfg.store.root.display(),
            "runtime config loaded"
        );

        let store: Arc<dyn DocumentStore> = Arc::new(FsStore::new(cfg.store.root.clone()));
        let completion = build_client_from_config(&cfg.completion, false)?;
        let grounded = build_client_from_config(&cfg.completion, true)?;

        let http = reqwest::Client::builder()
            .user_agent("news-curator/0.1")
            .timeout(Duration::from_secs(cfg.aggregator.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| PipelineError::Configuration(format!("http client: {e}")))?;
        let sources = build_sources(&cfg.sources, Some(grounded.clone()), http)?;
        let aggregator = SourceAggregator::new(sources, cfg.aggregator.clone());

        let ranker: Arc<dyn Ranker> = match cfg.ranking {
            RankingMode::Preference => Arc::new(PreferenceRanker::new(cfg.selection.clone())),
            RankingMode::Completion => Arc::new(CompletionRanker::new(
                completion.clone(),
                cfg.selection.target_total,
            )),
        };

        let fetcher = HttpContentFetcher::new(
            Duration::from_secs(cfg.enrichment.fetch_timeout_secs.max(1)),
            cfg.enrichment.max_content_chars,
        )
        .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;
        let enrichment =
            EnrichmentPipeline::new(Arc::new(fetcher), completion.clone(), cfg.enrichment.clone());

        let legacy = LegacyDigest::new(cfg.legacy.clone(), grounded, completion, store.clone());
        let utc_offset_hours = cfg.utc_offset_hours;
        let pipeline = CuratorPipeline::new(cfg, store, aggregator, ranker, enrichment);

        Ok(Self {
            utc_offset_hours,
            pipeline,
            legacy,
        })
    }
}

#[async_trait::async_trait]
impl RunTrigger for CuratorRuntime {
    async fn trigger(&self, mode: RunMode, now: DateTime<Utc>) -> Result<String, PipelineError> {
        info!(mode = mode.as_str(), "run triggered");
        match mode {
            RunMode::Candidate => {
                let report = self.pipeline.run(now).await?;
                Ok(format!(
                    "Saved: {} ({} items, phase {})",
                    report.batch_path, report.enriched, report.learning_phase
                ))
            }
            RunMode::Legacy => {
                let date = local_date(now, self.utc_offset_hours);
                let report = self.legacy.run(date).await?;
                Ok(format!("Saved files: {}", report.written.join(", ")))
            }
        }
    }
}
