// tests/ai_adapter_stub.rs
use news_curator::ai_adapter::{build_client_from_config, CompletionClient, DisabledClient};
use news_curator::config::CompletionConfig;
use news_curator::PipelineError;
use serial_test::serial;
use tokio::runtime::Runtime;

#[test]
fn disabled_client_always_errors() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let res = DisabledClient.complete("Summarize this.").await;
        assert!(res.is_err(), "disabled client must never produce text");
    });
}

#[tokio::test]
#[serial]
async fn test_mode_env_swaps_in_the_mock() {
    std::env::set_var("AI_TEST_MODE", "mock");
    let cfg = CompletionConfig {
        mock_reply: Some("URL: https://x.example/a".into()),
        ..Default::default()
    };
    let client = build_client_from_config(&cfg, false);
    std::env::remove_var("AI_TEST_MODE");

    let client = client.expect("mock needs no credentials");
    assert_eq!(client.provider_name(), "mock");
    assert_eq!(client.complete("anything").await.unwrap(), "URL: https://x.example/a");
}

#[test]
#[serial]
fn real_provider_without_key_is_a_configuration_error() {
    std::env::remove_var("AI_TEST_MODE");
    std::env::remove_var("GEMINI_API_KEY");
    let dir = tempfile::tempdir().unwrap();
    let cfg = CompletionConfig {
        cache_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let err = match build_client_from_config(&cfg, true) {
        Err(e) => e,
        Ok(_) => panic!("expected a configuration error"),
    };
    assert!(matches!(err, PipelineError::Configuration(_)));
}

#[test]
#[serial]
fn disabled_config_builds_a_disabled_client() {
    std::env::remove_var("AI_TEST_MODE");
    let cfg = CompletionConfig {
        enabled: false,
        ..Default::default()
    };
    let client = build_client_from_config(&cfg, false).unwrap();
    assert_eq!(client.provider_name(), "disabled");
}

#[test]
#[serial]
fn configured_providers_build_caching_clients() {
    std::env::remove_var("AI_TEST_MODE");
    let dir = tempfile::tempdir().unwrap();
    for (provider, name) in [("Gemini", "gemini"), ("openai", "openai")] {
        let cfg = CompletionConfig {
            provider: provider.into(),
            api_key: "literal-test-key".into(),
            cache_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let client = build_client_from_config(&cfg, provider == "Gemini").expect("client builds");
        assert_eq!(client.provider_name(), name);
    }
    assert!(dir.path().join("grounded").is_dir());
}
