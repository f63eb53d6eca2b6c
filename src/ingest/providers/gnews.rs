//! Structured news-API source (gnews.io v4): category headlines, or a keyword search
//! built from the model's boosted keywords.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::types::{CandidateItem, Category, SearchHints, SourceProvider};

const BASE_URL: &str = "https://gnews.io/api/v4";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resp {
    #[serde(default)]
    total_articles: u64,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GNewsSettings {
    pub name: String,
    pub category: Category,
    /// GNews headline topic ("technology", "business", "nation", ...).
    pub topic: Option<String>,
    /// Search for the boosted keywords instead of headlines when any exist.
    pub use_boosted_keywords: bool,
    pub lang: String,
    pub country: String,
}

pub struct GNewsProvider {
    settings: GNewsSettings,
    api_key: String,
    client: reqwest::Client,
}

impl GNewsProvider {
    pub fn new(settings: GNewsSettings, api_key: String, client: reqwest::Client) -> Self {
        Self {
            settings,
            api_key,
            client,
        }
    }

    /// Query parameters for one request; `None` when there is nothing to ask for.
    fn request_params(&self, max_items: usize, hints: &SearchHints) -> Option<(String, Vec<(&'static str, String)>)> {
        let mut params = vec![
            ("lang", self.settings.lang.clone()),
            ("country", self.settings.country.clone()),
            ("max", max_items.to_string()),
            ("apikey", self.api_key.clone()),
        ];
        let query = build_search_query(&hints.boosted_keywords);
        if self.settings.use_boosted_keywords && !query.is_empty() {
            params.push(("q", query));
            return Some((format!("{BASE_URL}/search"), params));
        }
        let topic = self.settings.topic.clone()?;
        params.push(("category", topic));
        Some((format!("{BASE_URL}/top-headlines"), params))
    }

    /// Map one JSON response body to candidates; `now` stands in for missing timestamps.
    pub fn parse_response(&self, body: &str, max_items: usize, now: DateTime<Utc>) -> Result<Vec<CandidateItem>> {
        let resp: Resp = serde_json::from_str(body).context("gnews json body")?;
        if resp.total_articles == 0 {
            return Ok(Vec::new());
        }

        let items = resp
            .articles
            .into_iter()
            .filter(|a| !a.url.is_empty() && !a.title.is_empty())
            .take(max_items)
            .map(|a| {
                let published_at = a
                    .published_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or(now);
                let source = a
                    .source
                    .and_then(|s| s.name)
                    .unwrap_or_else(|| self.settings.name.clone());
                CandidateItem::new(a.title, a.url, source, published_at, self.settings.category)
                    .with_description(a.description.unwrap_or_default())
            })
            .collect();
        Ok(items)
    }
}

/// `["AI", "LLM"]` → `"AI OR LLM"`.
pub fn build_search_query(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>()
        .join(" OR ")
}

#[async_trait]
impl SourceProvider for GNewsProvider {
    async fn fetch(&self, max_items: usize, hints: &SearchHints) -> Result<Vec<CandidateItem>> {
        let Some((endpoint, params)) = self.request_params(max_items, hints) else {
            tracing::debug!(source = %self.settings.name, "no topic and no boosted keywords; skipping");
            return Ok(Vec::new());
        };

        let body = self
            .client
            .get(&endpoint)
            .query(&params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("gnews request to {endpoint}"))?
            .text()
            .await
            .context("gnews body")?;

        self.parse_response(&body, max_items, Utc::now())
    }

    fn name(&self) -> &str {
        &self.settings.name
    }

    fn category(&self) -> Option<Category> {
        Some(self.settings.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(topic: Option<&str>, boosted: bool) -> GNewsProvider {
        GNewsProvider::new(
            GNewsSettings {
                name: "GNews tech".into(),
                category: Category::Ai,
                topic: topic.map(str::to_string),
                use_boosted_keywords: boosted,
                lang: "en".into(),
                country: "us".into(),
            },
            "k".into(),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn boosted_keywords_switch_to_search_endpoint() {
        let hints = SearchHints {
            boosted_keywords: vec!["claude".into(), " ".into(), "gemini".into()],
            ..Default::default()
        };
        let (endpoint, params) = provider(Some("technology"), true)
            .request_params(10, &hints)
            .unwrap();
        assert!(endpoint.ends_with("/search"));
        assert!(params.contains(&("q", "claude OR gemini".to_string())));
    }

    #[test]
    fn headlines_without_hints() {
        let (endpoint, params) = provider(Some("business"), true)
            .request_params(5, &SearchHints::default())
            .unwrap();
        assert!(endpoint.ends_with("/top-headlines"));
        assert!(params.contains(&("category", "business".to_string())));
        assert!(provider(None, false)
            .request_params(5, &SearchHints::default())
            .is_none());
    }
}
