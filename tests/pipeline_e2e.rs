// tests/pipeline_e2e.rs
//
// End-to-end candidate runs over stub sources, a stub fetcher, a canned completion
// provider and an in-memory store.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use news_curator::ai_adapter::MockProvider;
use news_curator::config::PipelineConfig;
use news_curator::enrich::{ContentFetcher, EnrichmentPipeline};
use news_curator::history::{HistoryLog, SelectionHistoryEntry};
use news_curator::ingest::types::{CandidateItem, Category, SearchHints, SourceProvider};
use news_curator::ingest::{AggregatorConfig, SourceAggregator};
use news_curator::pipeline::{batch_path, CandidateBatch, CuratorPipeline, PREFERENCES_PATH};
use news_curator::preference::PreferenceDocument;
use news_curator::select::PreferenceRanker;
use news_curator::store::{DocumentStore, MemoryStore};
use news_curator::{PipelineError, Stage};

const SUMMARY: &str = r#"{"headline":"H","key_points":["k1","k2"],"detailed_summary":"d","why_it_matters":"w"}"#;
const BROKEN_URL: &str = "https://ai.example/ai/story-00";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 3, 0, 0).unwrap()
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

struct StaticSource {
    name: String,
    category: Category,
    items: Vec<CandidateItem>,
}

#[async_trait::async_trait]
impl SourceProvider for StaticSource {
    async fn fetch(&self, max: usize, _h: &SearchHints) -> Result<Vec<CandidateItem>> {
        Ok(self.items.iter().take(max).cloned().collect())
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn category(&self) -> Option<Category> {
        Some(self.category)
    }
}

struct DownSource;

#[async_trait::async_trait]
impl SourceProvider for DownSource {
    async fn fetch(&self, _max: usize, _h: &SearchHints) -> Result<Vec<CandidateItem>> {
        anyhow::bail!("connection refused")
    }
    fn name(&self) -> &str {
        "down"
    }
}

/// Every page loads except `BROKEN_URL`.
struct Fetcher;

#[async_trait::async_trait]
impl ContentFetcher for Fetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        if url == BROKEN_URL {
            anyhow::bail!("HTTP 500");
        }
        Ok(format!("Full text of {url}"))
    }
}

fn item(cat: Category, host: &str, i: usize, minutes_old: i64) -> CandidateItem {
    CandidateItem::new(
        format!("{i:02} {cat} desk headline number {i}"),
        format!("https://{host}/{cat}/story-{i:02}"),
        host,
        now() - Duration::minutes(minutes_old),
        cat,
    )
}

/// 30 raw items: 3 share one URL, 2 share one normalized path.
fn sources() -> Vec<Arc<dyn SourceProvider>> {
    let ai: Vec<_> = (0..10).map(|i| item(Category::Ai, "ai.example", i, i as i64)).collect();

    let mut finance: Vec<_> = (0..8)
        .map(|i| item(Category::Finance, "fin.example", i, 20 + i as i64))
        .collect();
    for n in 0..2 {
        let mut dup = item(Category::Finance, "fin.example", 90 + n, 40);
        dup.title = format!("Reposted wire copy variant {n}");
        dup.url = "https://ai.example/ai/story-03".to_string();
        finance.push(dup);
    }

    let mut politics: Vec<_> = (0..9)
        .map(|i| item(Category::Politics, "pol.example", i, 60 + i as i64))
        .collect();
    let mut mirror = item(Category::Politics, "mirror.example", 0, 70);
    mirror.title = "Syndicated copy of the first politics story".to_string();
    mirror.url = "https://mirror.example/politics/story-00/?ref=feed".to_string();
    politics.push(mirror);

    vec![
        Arc::new(StaticSource {
            name: "ai".into(),
            category: Category::Ai,
            items: ai,
        }),
        Arc::new(StaticSource {
            name: "finance".into(),
            category: Category::Finance,
            items: finance,
        }),
        Arc::new(StaticSource {
            name: "politics".into(),
            category: Category::Politics,
            items: politics,
        }),
        Arc::new(DownSource),
    ]
}

fn pipeline(store: Arc<MemoryStore>, sources: Vec<Arc<dyn SourceProvider>>) -> CuratorPipeline {
    let cfg = PipelineConfig {
        aggregator: AggregatorConfig {
            per_source_floor: 20,
            ..Default::default()
        },
        ..Default::default()
    };
    let aggregator = SourceAggregator::new(sources, cfg.aggregator.clone());
    let ranker = Arc::new(PreferenceRanker::new(cfg.selection.clone()));
    let enrichment = EnrichmentPipeline::new(
        Arc::new(Fetcher),
        Arc::new(MockProvider::fixed(SUMMARY)),
        cfg.enrichment.clone(),
    );
    CuratorPipeline::new(cfg, store, aggregator, ranker, enrichment)
}

async fn load_batch(store: &MemoryStore, date: NaiveDate) -> CandidateBatch {
    let doc = store.get(&batch_path(date)).await.expect("batch persisted");
    serde_json::from_str(&doc.content).expect("batch json")
}

#[tokio::test]
async fn thirty_raw_items_yield_twenty_seven_unique_and_a_clean_batch() {
    let store = Arc::new(MemoryStore::new());
    let report = pipeline(store.clone(), sources()).run(now()).await.expect("run ok");

    assert_eq!(report.date, run_date());
    assert_eq!(report.raw, 30);
    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.deduplicated, 27);
    assert_eq!(report.selected, 12);
    assert_eq!(report.fetch_failed, 1);
    assert_eq!(report.enriched, 11);
    assert_eq!(report.learning_phase, 0);

    let batch = load_batch(&store, run_date()).await;
    assert_eq!(batch.items.len(), 11);
    assert!(batch.items.iter().all(|i| i.url != BROKEN_URL));
    assert!(batch.items.iter().all(|i| i.summary.is_some() && i.raw_content.is_some()));

    // unique URLs in the persisted batch
    let mut urls: Vec<_> = batch.items.iter().map(|i| i.url.as_str()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 11);

    // preferences are written alongside, plus a readable markdown copy of the batch
    let paths = store.paths();
    assert!(paths.contains(&PREFERENCES_PATH.to_string()));
    assert!(paths.contains(&"news/2026-10-16-candidates.md".to_string()));
}

#[tokio::test]
async fn previous_batches_seed_dedup() {
    let store = Arc::new(MemoryStore::new());
    let yesterday = CandidateBatch {
        date: run_date() - Duration::days(1),
        generated_at: now() - Duration::days(1),
        learning_phase: 0,
        items: (0..5).map(|i| item(Category::Ai, "ai.example", i, 0)).collect(),
    };
    store
        .put(
            &batch_path(yesterday.date),
            &serde_json::to_string(&yesterday).unwrap(),
            "seed",
            None,
        )
        .await
        .unwrap();

    let report = pipeline(store.clone(), sources()).run(now()).await.expect("run ok");
    // 5 already-published ai stories, both copies of story 03 and the mirror are gone
    assert_eq!(report.deduplicated, 22);
}

#[tokio::test]
async fn learned_phase_is_persisted_before_selection() {
    let store = Arc::new(MemoryStore::new());
    let history = HistoryLog::from_entries(
        (0..7)
            .map(|d| SelectionHistoryEntry {
                date: run_date() - Duration::days(7 - d),
                candidate_topics: vec!["desk".into(), "celebrity".into()],
                selected_topics: vec!["desk".into()],
                selected_sources: vec!["ai.example".into()],
            })
            .collect(),
    );
    let doc = PreferenceDocument {
        selection_history: history,
        ..Default::default()
    };
    store
        .put(PREFERENCES_PATH, &serde_json::to_string(&doc).unwrap(), "seed", None)
        .await
        .unwrap();

    let report = pipeline(store.clone(), sources()).run(now()).await.expect("run ok");
    assert_eq!(report.learning_phase, 2);
    assert_eq!(report.phase_transition, Some((0, 2)));

    let saved: PreferenceDocument =
        serde_json::from_str(&store.get(PREFERENCES_PATH).await.unwrap().content).unwrap();
    assert_eq!(saved.state.learning_phase, 2);
    assert_eq!(saved.state.boosted_keywords, vec!["desk".to_string()]);
    assert_eq!(saved.state.suppressed_keywords, vec!["celebrity".to_string()]);
    assert_eq!(saved.selection_history.len(), 7);

    let batch = load_batch(&store, run_date()).await;
    assert_eq!(batch.learning_phase, 2);
}

#[tokio::test]
async fn all_sources_down_is_an_empty_result() {
    let store = Arc::new(MemoryStore::new());
    let err = pipeline(store.clone(), vec![Arc::new(DownSource)])
        .run(now())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyResult { stage: Stage::Aggregate, .. }));
    assert!(store.get(&batch_path(run_date())).await.unwrap_err().is_not_found());
}

/// Remembers the hints it was handed and returns nothing.
#[derive(Default)]
struct HintRecorder {
    seen: std::sync::Mutex<Option<SearchHints>>,
}

#[async_trait::async_trait]
impl SourceProvider for HintRecorder {
    async fn fetch(&self, _max: usize, h: &SearchHints) -> Result<Vec<CandidateItem>> {
        *self.seen.lock().unwrap() = Some(h.clone());
        Ok(Vec::new())
    }
    fn name(&self) -> &str {
        "recorder"
    }
}

#[tokio::test]
async fn sources_see_the_local_run_date() {
    let recorder = Arc::new(HintRecorder::default());
    let store = Arc::new(MemoryStore::new());
    // 20:00 UTC is already the next morning at the default +9h offset
    let evening = Utc.with_ymd_and_hms(2026, 10, 15, 20, 0, 0).unwrap();
    let _ = pipeline(store, vec![recorder.clone() as Arc<dyn SourceProvider>])
        .run(evening)
        .await;

    let seen = recorder.seen.lock().unwrap().clone().expect("source was asked");
    assert_eq!(seen.run_date, Some(run_date()));
}
