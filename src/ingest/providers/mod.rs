// src/ingest/providers/mod.rs
pub mod gnews;
pub mod grounded;
pub mod rss;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ai_adapter::DynCompletion;
use crate::config::resolve_secret;
use crate::error::PipelineError;
use crate::ingest::types::{Category, SourceProvider};

pub use gnews::{GNewsProvider, GNewsSettings};
pub use grounded::GroundedSearchProvider;
pub use rss::RssFeedProvider;

fn default_env() -> String {
    "ENV".to_string()
}
fn default_lang() -> String {
    "en".to_string()
}
fn default_country() -> String {
    "us".to_string()
}
fn default_true() -> bool {
    true
}

/// One configured source, as written in `[[sources]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Rss {
        name: String,
        url: String,
        category: Category,
    },
    Gnews {
        name: String,
        category: Category,
        #[serde(default)]
        topic: Option<String>,
        #[serde(default = "default_true")]
        use_boosted_keywords: bool,
        /// "ENV" reads GNEWS_API_KEY.
        #[serde(default = "default_env")]
        api_key: String,
        #[serde(default = "default_lang")]
        lang: String,
        #[serde(default = "default_country")]
        country: String,
    },
    Grounded {
        name: String,
        category: Category,
        /// What to look for, e.g. "notable AI model releases and research".
        brief: String,
    },
}

impl SourceSpec {
    pub fn name(&self) -> &str {
        match self {
            SourceSpec::Rss { name, .. }
            | SourceSpec::Gnews { name, .. }
            | SourceSpec::Grounded { name, .. } => name,
        }
    }
}

/// Build providers from config. Credentials are resolved here, so a missing key fails
/// before the run touches anything.
pub fn build_sources(
    specs: &[SourceSpec],
    grounded: Option<DynCompletion>,
    client: reqwest::Client,
) -> Result<Vec<Arc<dyn SourceProvider>>, PipelineError> {
    let mut out: Vec<Arc<dyn SourceProvider>> = Vec::with_capacity(specs.len());
    for spec in specs {
        match spec {
            SourceSpec::Rss {
                name,
                url,
                category,
            } => out.push(Arc::new(RssFeedProvider::from_url(
                name,
                url,
                *category,
                client.clone(),
            ))),
            SourceSpec::Gnews {
                name,
                category,
                topic,
                use_boosted_keywords,
                api_key,
                lang,
                country,
            } => {
                let key = resolve_secret(api_key, "GNEWS_API_KEY")?;
                let settings = GNewsSettings {
                    name: name.clone(),
                    category: *category,
                    topic: topic.clone(),
                    use_boosted_keywords: *use_boosted_keywords,
                    lang: lang.clone(),
                    country: country.clone(),
                };
                out.push(Arc::new(GNewsProvider::new(settings, key, client.clone())));
            }
            SourceSpec::Grounded {
                name,
                category,
                brief,
            } => {
                let Some(completion) = grounded.clone() else {
                    return Err(PipelineError::Configuration(format!(
                        "source `{name}` needs a completion provider"
                    )));
                };
                out.push(Arc::new(GroundedSearchProvider::new(
                    name, *category, brief, completion,
                )));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_adapter::MockProvider;

    #[test]
    fn grounded_source_without_completion_is_config_error() {
        let specs = vec![SourceSpec::Grounded {
            name: "web".into(),
            category: Category::Ai,
            brief: "ai news".into(),
        }];
        let err = match build_sources(&specs, None, reqwest::Client::new()) {
            Err(e) => e,
            Ok(_) => panic!("expected configuration error"),
        };
        assert!(matches!(err, PipelineError::Configuration(_)));

        let ok = build_sources(
            &specs,
            Some(Arc::new(MockProvider::fixed(""))),
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].name(), "web");
    }

    #[test]
    fn gnews_spec_defaults() {
        let spec: SourceSpec = serde_json::from_str(
            r#"{"kind":"gnews","name":"biz","category":"finance","topic":"business"}"#,
        )
        .unwrap();
        match spec {
            SourceSpec::Gnews {
                api_key,
                use_boosted_keywords,
                lang,
                ..
            } => {
                assert_eq!(api_key, "ENV");
                assert!(use_boosted_keywords);
                assert_eq!(lang, "en");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
