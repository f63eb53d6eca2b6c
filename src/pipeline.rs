// src/pipeline.rs
//! Candidate-mode orchestration: aggregate → dedup → rank/select → enrich → persist.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::dedup::dedup;
use crate::enrich::EnrichmentPipeline;
use crate::error::{PipelineError, Stage};
use crate::ingest::types::{CandidateItem, Category, SearchHints};
use crate::ingest::SourceAggregator;
use crate::preference::{PreferenceDocument, PreferenceModel};
use crate::select::{Ranker, Selector};
use crate::store::{load_json_or_default, upsert, DocumentStore, StoreError};

pub const PREFERENCES_PATH: &str = "preferences.json";

/// Which flow a trigger runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Candidate,
    Legacy,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Candidate => "candidate",
            RunMode::Legacy => "legacy",
        }
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidate" | "" => Ok(RunMode::Candidate),
            "legacy" => Ok(RunMode::Legacy),
            other => Err(format!("unknown mode `{other}`")),
        }
    }
}

/// Persisted output of one candidate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateBatch {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub learning_phase: u8,
    pub items: Vec<CandidateItem>,
}

pub fn batch_path(date: NaiveDate) -> String {
    format!("news/{date}-candidates.json")
}

pub fn batch_markdown_path(date: NaiveDate) -> String {
    format!("news/{date}-candidates.md")
}

/// Human-readable rendering of a batch, stored next to the JSON.
pub fn render_batch_markdown(batch: &CandidateBatch) -> String {
    let mut md = format!("# News candidates - {}\n\n", batch.date);
    for (i, it) in batch.items.iter().enumerate() {
        let heading = it
            .summary
            .as_ref()
            .map(|s| s.headline.as_str())
            .unwrap_or(it.title.as_str());
        let _ = writeln!(md, "{}. **{}**", i + 1, heading);
        let _ = writeln!(md, "   📰 {} | {}", it.source, it.category);
        let _ = writeln!(md, "   URL: {}", it.url);
        if let Some(s) = &it.summary {
            for p in &s.key_points {
                let _ = writeln!(md, "   - {p}");
            }
            let _ = writeln!(md, "   Why it matters: {}", s.why_it_matters);
        }
        md.push('\n');
    }
    md
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub date: NaiveDate,
    pub learning_phase: u8,
    pub phase_transition: Option<(u8, u8)>,
    pub raw: usize,
    pub failed_sources: usize,
    pub deduplicated: usize,
    pub selected: usize,
    pub shortfalls: BTreeMap<Category, usize>,
    pub enriched: usize,
    pub fetch_failed: usize,
    pub summary_failed: usize,
    pub batch_path: String,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Candidate runs by outcome.");
        describe_gauge!("pipeline_last_batch_size", "Items in the last persisted batch.");
        describe_gauge!("preference_learning_phase", "Current learning phase (0-3).");
    });
}

/// Run date in the configured local offset.
pub fn local_date(now: DateTime<Utc>, utc_offset_hours: i32) -> NaiveDate {
    (now + Duration::hours(i64::from(utc_offset_hours))).date_naive()
}

pub struct CuratorPipeline {
    cfg: PipelineConfig,
    store: Arc<dyn DocumentStore>,
    aggregator: SourceAggregator,
    model: PreferenceModel,
    ranker: Arc<dyn Ranker>,
    selector: Selector,
    enrichment: EnrichmentPipeline,
}

impl CuratorPipeline {
    pub fn new(
        cfg: PipelineConfig,
        store: Arc<dyn DocumentStore>,
        aggregator: SourceAggregator,
        ranker: Arc<dyn Ranker>,
        enrichment: EnrichmentPipeline,
    ) -> Self {
        let model = PreferenceModel::new(cfg.preference.clone());
        let selector = Selector::new(cfg.selection.clone());
        Self {
            cfg,
            store,
            aggregator,
            model,
            ranker,
            selector,
            enrichment,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        let res = self.run_inner(now).await;
        let status = if res.is_ok() { "ok" } else { "error" };
        counter!("pipeline_runs_total", "status" => status).increment(1);
        res
    }

    async fn run_inner(&self, now: DateTime<Utc>) -> Result<RunReport, PipelineError> {
        let date = local_date(now, self.cfg.utc_offset_hours);
        tracing::info!(target: "pipeline", %date, sources = self.aggregator.source_count(), "candidate run started");

        // 1) preferences: recompute from history and persist before anything consumes them
        let mut doc: PreferenceDocument = load_json_or_default(self.store.as_ref(), PREFERENCES_PATH).await?;
        let folded = doc
            .selection_history
            .compact(self.cfg.preference.history_retention);
        if folded > 0 {
            tracing::info!(target: "pipeline", folded, "archived old history entries");
        }
        let update = self.model.update(&doc.state, &doc.selection_history);
        doc.state = update.state;
        let prefs = doc.state.clone();
        gauge!("preference_learning_phase").set(f64::from(prefs.learning_phase));
        let json = serde_json::to_string_pretty(&doc).map_err(|e| StoreError::Corrupt {
            path: PREFERENCES_PATH.to_string(),
            reason: e.to_string(),
        })?;
        upsert(
            self.store.as_ref(),
            PREFERENCES_PATH,
            &json,
            &format!("Update preferences for {date}"),
        )
        .await?;

        // 2) aggregate
        let distribution = if prefs.learning_phase >= 2 {
            prefs.category_distribution.clone()
        } else {
            BTreeMap::new()
        };
        let hints = SearchHints {
            run_date: Some(date),
            ..prefs.search_hints()
        };
        let aggregated = self.aggregator.collect(&distribution, &hints, now).await;
        let raw = aggregated.items.len();
        let failed_sources = aggregated.failed_sources();
        if raw == 0 {
            return Err(PipelineError::empty(
                Stage::Aggregate,
                format!("{failed_sources} of {} sources failed", aggregated.sources.len()),
            ));
        }

        // 3) dedup against the run itself and the last N days of batches
        let history = self.load_recent_batches(date).await?;
        let deduped = dedup(aggregated.items, &history, &self.cfg.dedup);
        let deduplicated = deduped.kept.len();
        if deduplicated == 0 {
            return Err(PipelineError::empty(
                Stage::Dedup,
                format!("all {raw} candidates were already seen"),
            ));
        }

        // 4) rank + balance
        let ranked = self.ranker.rank(&deduped.kept, &prefs).await;
        let selection = self.selector.select(deduped.kept, &ranked, &prefs);
        let selected = selection.items.len();
        if selected == 0 {
            return Err(PipelineError::empty(
                Stage::Select,
                format!("ranker `{}` left nothing eligible", self.ranker.name()),
            ));
        }

        // 5) enrich
        let enriched = self.enrichment.enrich(selection.items).await;
        if enriched.items.is_empty() {
            return Err(PipelineError::empty(
                Stage::Enrich,
                format!(
                    "{} fetch failures, {} summary failures",
                    enriched.fetch_failed.len(),
                    enriched.summary_failed.len()
                ),
            ));
        }

        // 6) persist
        let batch = CandidateBatch {
            date,
            generated_at: now,
            learning_phase: prefs.learning_phase,
            items: enriched.items,
        };
        let path = batch_path(date);
        let json = serde_json::to_string_pretty(&batch).map_err(|e| StoreError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        upsert(
            self.store.as_ref(),
            &path,
            &json,
            &format!("Add news candidates for {date}"),
        )
        .await?;
        upsert(
            self.store.as_ref(),
            &batch_markdown_path(date),
            &render_batch_markdown(&batch),
            &format!("Add news candidates for {date}"),
        )
        .await?;
        gauge!("pipeline_last_batch_size").set(batch.items.len() as f64);

        let report = RunReport {
            date,
            learning_phase: prefs.learning_phase,
            phase_transition: update.transition,
            raw,
            failed_sources,
            deduplicated,
            selected,
            shortfalls: selection.shortfalls,
            enriched: batch.items.len(),
            fetch_failed: enriched.fetch_failed.len(),
            summary_failed: enriched.summary_failed.len(),
            batch_path: path,
        };
        tracing::info!(
            target: "pipeline",
            raw = report.raw,
            deduplicated = report.deduplicated,
            selected = report.selected,
            enriched = report.enriched,
            phase = report.learning_phase,
            "candidate run finished"
        );
        Ok(report)
    }

    /// Items of the previous `history_days` batches. Missing days are skipped; an
    /// unreadable batch is logged and skipped.
    async fn load_recent_batches(&self, date: NaiveDate) -> Result<Vec<CandidateItem>, PipelineError> {
        let mut items = Vec::new();
        for back in 1..=i64::from(self.cfg.dedup.history_days) {
            let path = batch_path(date - Duration::days(back));
            let doc = match self.store.get(&path).await {
                Ok(d) => d,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_str::<CandidateBatch>(&doc.content) {
                Ok(b) => items.extend(b.items),
                Err(e) => tracing::warn!(target: "pipeline", error = %e, path = %path, "skipping unreadable batch"),
            }
        }
        Ok(items)
    }
}
