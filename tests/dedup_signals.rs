// tests/dedup_signals.rs
use chrono::{TimeZone, Utc};
use news_curator::dedup::{dedup, DedupConfig, DedupIndex, DedupSignal};
use news_curator::ingest::types::{CandidateItem, Category};

fn item(title: &str, url: &str) -> CandidateItem {
    CandidateItem::new(
        title,
        url,
        "Wire",
        Utc.with_ymd_and_hms(2026, 10, 16, 1, 0, 0).unwrap(),
        Category::Other,
    )
}

#[test]
fn each_signal_alone_drops_a_candidate() {
    let seen = item("Chipmaker posts record quarter", "https://a.example/2026/10/chips-record");
    let mut index = DedupIndex::new(DedupConfig::default());
    index.insert(&seen);

    // same URL, different title
    assert_eq!(
        index.check(&item("Totally different headline", "https://a.example/2026/10/chips-record")),
        Some(DedupSignal::Url)
    );
    // same path on a mirror host with tracking params and trailing slash
    assert_eq!(
        index.check(&item(
            "Another unrelated headline",
            "http://mirror.example/2026/10/chips-record/?utm_source=x#c"
        )),
        Some(DedupSignal::Path)
    );
    // same first 25 characters of the title
    assert_eq!(
        index.check(&item(
            "Chipmaker posts record quarter, shares jump",
            "https://b.example/markets/other-story"
        )),
        Some(DedupSignal::TitlePrefix)
    );
    assert_eq!(
        index.check(&item("Fresh story", "https://c.example/markets/fresh-story")),
        None
    );
}

#[test]
fn short_paths_are_not_a_signal() {
    let mut index = DedupIndex::new(DedupConfig::default());
    index.insert(&item("Front page A", "https://a.example/news/"));
    // "/news" is shorter than 10 chars, so a different host with the same path survives
    assert_eq!(index.check(&item("Front page B", "https://b.example/news")), None);
}

#[test]
fn history_window_and_in_batch_duplicates() {
    let history = vec![item("Yesterday's big story here", "https://a.example/2026/10/15/big")];
    let batch = vec![
        item("Yesterday's big story here, again", "https://z.example/other/path/1"),
        item("New story number one today", "https://a.example/2026/10/16/one"),
        item("New story number one today!", "https://a.example/2026/10/16/one-copy"),
        item("Something else entirely", "https://a.example/2026/10/16/one"),
        item("Third distinct story text", "https://d.example/2026/10/16/third"),
    ];
    let out = dedup(batch, &history, &DedupConfig::default());
    let urls: Vec<_> = out.kept.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://a.example/2026/10/16/one",
            "https://d.example/2026/10/16/third"
        ]
    );
    assert_eq!(out.dropped_title, 2);
    assert_eq!(out.dropped_url, 1);
    assert_eq!(out.dropped(), 3);
}

#[test]
fn survivors_never_share_a_signal() {
    let batch: Vec<_> = (0..40)
        .map(|i| {
            item(
                &format!("Story {:02} about markets and more words", i % 13),
                &format!("https://h{}.example/section/story-{}", i % 3, i % 17),
            )
        })
        .collect();
    let cfg = DedupConfig::default();
    let out = dedup(batch, &[], &cfg);

    let mut index = DedupIndex::new(cfg);
    for it in &out.kept {
        assert!(index.admit(it).is_ok(), "duplicate survived: {}", it.url);
    }
}
