//! Full-text fetch for selected candidates.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::normalize_text;

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Readable body text of the page at `url`.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

pub struct HttpContentFetcher {
    client: reqwest::Client,
    max_chars: usize,
}

impl HttpContentFetcher {
    pub fn new(timeout: Duration, max_chars: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; news-curator/0.1)")
            .timeout(timeout)
            .build()
            .context("building content fetch client")?;
        Ok(Self { client, max_chars })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let html = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("fetching {url}"))?
            .text()
            .await
            .context("reading article body")?;
        let text = extract_article_text(&html, self.max_chars);
        if text.is_empty() {
            bail!("no readable text at {url}");
        }
        Ok(text)
    }
}

/// Drop script/style/noscript, prefer the `<article>` element, then normalize.
pub fn extract_article_text(html: &str, max_chars: usize) -> String {
    static RE_NOISE: OnceCell<Regex> = OnceCell::new();
    static RE_ARTICLE: OnceCell<Regex> = OnceCell::new();
    static RE_BODY: OnceCell<Regex> = OnceCell::new();

    let re_noise = RE_NOISE.get_or_init(|| {
        Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>")
            .expect("noise regex")
    });
    let re_article =
        RE_ARTICLE.get_or_init(|| Regex::new(r"(?is)<article\b[^>]*>(.*?)</article>").expect("article regex"));
    let re_body = RE_BODY.get_or_init(|| Regex::new(r"(?is)<body\b[^>]*>(.*)</body>").expect("body regex"));

    let cleaned = re_noise.replace_all(html, " ");
    let region = re_article
        .captures(&cleaned)
        .or_else(|| re_body.captures(&cleaned))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| cleaned.to_string());
    normalize_text(&region, max_chars)
}
