use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::types::{CandidateItem, Category, SearchHints, SourceProvider};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), 0)
}

/// RSS 2.0 feed source. Fixture mode parses an in-memory document (tests, offline runs).
pub struct RssFeedProvider {
    name: String,
    category: Category,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedProvider {
    pub fn from_url(name: &str, url: &str, category: Category, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            category,
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    pub fn from_fixture_str(name: &str, xml: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            category,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items_from_str(&self, s: &str, now: DateTime<Utc>) -> Result<Vec<CandidateItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let (Some(title), Some(link)) = (it.title, it.link) else {
                continue;
            };
            let published_at = it
                .pub_date
                .as_deref()
                .and_then(parse_rfc2822)
                .unwrap_or(now);
            out.push(
                CandidateItem::new(title, link, self.name.clone(), published_at, self.category)
                    .with_description(it.description.unwrap_or_default()),
            );
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for RssFeedProvider {
    async fn fetch(&self, max_items: usize, _hints: &SearchHints) -> Result<Vec<CandidateItem>> {
        let now = Utc::now();
        let mut items = match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s, now)?,
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await.and_then(|r| r.error_for_status()) {
                    Ok(resp) => resp.text().await.context("rss http .text()")?,
                    Err(e) => {
                        counter!("ingest_provider_http_errors_total").increment(1);
                        return Err(e).with_context(|| format!("rss http get {url}"));
                    }
                };
                self.parse_items_from_str(&body, now)?
            }
        };
        items.truncate(max_items);
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<Category> {
        Some(self.category)
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
