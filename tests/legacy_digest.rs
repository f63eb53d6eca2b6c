// tests/legacy_digest.rs
use std::sync::Arc;

use chrono::NaiveDate;
use news_curator::ai_adapter::MockProvider;
use news_curator::legacy::{LegacyConfig, LegacyDigest};
use news_curator::store::{DocumentStore, MemoryStore};
use news_curator::{PipelineError, Stage};

/// 2026-10-12: a Monday, day 285 of the year, so every default category is due.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
}

fn grounded(ai_reply: &'static str) -> MockProvider {
    MockProvider::from_fn(move |prompt| {
        if prompt.contains("AI developer tools") {
            Ok(ai_reply.to_string())
        } else if prompt.contains("politics and economy") {
            Ok("   ".to_string())
        } else if prompt.contains("research papers") {
            Ok("No notable papers this week.".to_string())
        } else {
            anyhow::bail!("grounding quota exceeded")
        }
    })
}

#[tokio::test]
async fn writes_digests_and_scripts_for_due_categories() {
    let store = Arc::new(MemoryStore::new());
    let digest = LegacyDigest::new(
        LegacyConfig::default(),
        Arc::new(grounded("1. Gemini ships agent mode\n   URL: https://x.example/g")),
        Arc::new(MockProvider::fixed("Good morning! Here is today's news.")),
        store.clone(),
    );
    assert_eq!(digest.due_categories(monday()).len(), 4);

    let report = digest.run(monday()).await.expect("run");
    assert_eq!(
        report.written,
        vec![
            "news/2026-10-12-ai.md".to_string(),
            "scripts/2026-10-12-ai.md".to_string(),
            "news/2026-10-12-papers.md".to_string(),
        ]
    );
    assert_eq!(report.skipped, vec!["politics".to_string(), "serendipity".to_string()]);

    let news = store.get("news/2026-10-12-ai.md").await.unwrap().content;
    assert!(news.starts_with("# AI Tech News - 2026-10-12\n\n1. Gemini ships agent mode"));
    let script = store.get("scripts/2026-10-12-ai.md").await.unwrap().content;
    assert!(script.starts_with("# AI Tech News Script - 2026-10-12"));
}

#[tokio::test]
async fn no_news_marker_skips_the_script() {
    let store = Arc::new(MemoryStore::new());
    let digest = LegacyDigest::new(
        LegacyConfig::default(),
        Arc::new(grounded("No major releases between the dates.")),
        Arc::new(MockProvider::fixed("script")),
        store.clone(),
    );
    // Tuesday: only the daily categories are due
    let tuesday = monday().succ_opt().unwrap();
    let report = digest.run(tuesday).await.expect("run");
    assert_eq!(report.written, vec!["news/2026-10-13-ai.md".to_string()]);
    assert!(store.get("scripts/2026-10-13-ai.md").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn nothing_written_is_an_empty_result() {
    let digest = LegacyDigest::new(
        LegacyConfig::default(),
        Arc::new(MockProvider::from_fn(|_| anyhow::bail!("offline"))),
        Arc::new(MockProvider::fixed("unused")),
        Arc::new(MemoryStore::new()),
    );
    let err = digest.run(monday()).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyResult { stage: Stage::Legacy, .. }));
}
