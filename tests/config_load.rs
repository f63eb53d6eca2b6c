// tests/config_load.rs
use std::io::Write;

use news_curator::config::{self, CompletionConfig, ENV_CONFIG_PATH};
use news_curator::ingest::providers::SourceSpec;
use news_curator::ingest::types::Category;
use news_curator::legacy::Schedule;
use news_curator::PipelineError;
use serial_test::serial;

const SAMPLE: &str = r#"
utc_offset_hours = 9

[store]
root = "state"

[[sources]]
kind = "rss"
name = "Example Tech"
url = "https://tech.example/feed"
category = "ai"

[[sources]]
kind = "gnews"
name = "GNews business"
category = "finance"
topic = "business"

[preference]
phase_thresholds = [2, 5, 10]

[preference.suppression_phase2]
min_offered = 4
max_rate = 0.25

[enrichment.throttle]
burst = 5

[completion]
provider = "openai"
daily_limit = 10

[[legacy.categories]]
id = "ai"
name = "AI Tech News"
brief = "Today is {today}."
generate_script = true
schedule = { every = "daily" }
"#;

#[test]
#[serial]
fn loads_toml_from_env_path() {
    let mut f = tempfile::Builder::new().suffix(".toml").tempfile().expect("tmp");
    f.write_all(SAMPLE.as_bytes()).unwrap();
    std::env::set_var(ENV_CONFIG_PATH, f.path());

    let cfg = config::load_default().expect("config loads");
    std::env::remove_var(ENV_CONFIG_PATH);

    assert_eq!(cfg.store.root.to_str(), Some("state"));
    assert_eq!(cfg.sources.len(), 2);
    assert!(matches!(
        &cfg.sources[1],
        SourceSpec::Gnews { category: Category::Finance, api_key, .. } if api_key == "ENV"
    ));
    assert_eq!(cfg.preference.phase_thresholds, [2, 5, 10]);
    assert_eq!(cfg.preference.suppression_phase2.min_offered, 4);
    // untouched nested defaults survive
    assert_eq!(cfg.preference.suppression_phase3.min_offered, 3);
    assert_eq!(cfg.enrichment.throttle.burst, 5);
    assert_eq!(cfg.enrichment.throttle.cooldown_secs, 60);
    assert_eq!(cfg.completion.daily_limit, 10);
    assert_eq!(cfg.legacy.categories.len(), 1);
    assert_eq!(cfg.legacy.categories[0].schedule, Schedule::Daily);
    assert!(!cfg.legacy.no_news_markers.is_empty());
}

#[test]
#[serial]
fn env_path_pointing_nowhere_is_an_error() {
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here.toml");
    let res = config::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);
    assert!(res.is_err());
}

#[test]
#[serial]
fn missing_credentials_fail_before_any_run() {
    std::env::remove_var("AI_TEST_MODE");
    std::env::remove_var("OPENAI_API_KEY");
    let cfg = CompletionConfig {
        provider: "openai".into(),
        ..Default::default()
    };
    let err = cfg.resolve_api_key().unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(msg) if msg.contains("OPENAI_API_KEY")));

    std::env::set_var("OPENAI_API_KEY", "sk-test");
    assert_eq!(cfg.resolve_api_key().unwrap(), "sk-test");
    std::env::remove_var("OPENAI_API_KEY");

    let unknown = CompletionConfig {
        provider: "bard".into(),
        ..Default::default()
    };
    assert!(unknown.resolve_api_key().is_err());
}
