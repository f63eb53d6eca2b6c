// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of output categories used by quotas and the preference model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ai,
    Finance,
    Politics,
    /// Also the "unclassified" tag: aggregation runs keyword classification on any item
    /// still carrying `Other`, so a source cannot pin an item to it.
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ai => "ai",
            Category::Finance => "finance",
            Category::Politics => "politics",
            Category::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(Category::Ai),
            "finance" => Ok(Category::Finance),
            "politics" => Ok(Category::Politics),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category `{other}`")),
        }
    }
}

// Parsed from a plain string so it also works as a TOML/JSON map key.
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured summary produced by the enrichment stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub headline: String,
    pub key_points: Vec<String>,
    pub detailed_summary: String,
    pub why_it_matters: String,
}

/// One prospective article, from aggregation until it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl CandidateItem {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
        category: Category,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
            published_at,
            description: String::new(),
            raw_content: None,
            category,
            summary: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Lowercased title + description, used for keyword and topic matching.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

/// Per-run hints a source may use to steer its query (e.g. boosted keywords).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHints {
    pub boosted_keywords: Vec<String>,
    pub suppressed_keywords: Vec<String>,
    /// The run's local calendar date; sources fall back to the UTC date when unset.
    pub run_date: Option<NaiveDate>,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Fetch up to `max_items` normalized candidates.
    async fn fetch(&self, max_items: usize, hints: &SearchHints) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &str;
    /// Category this source mostly produces; drives its share of the item budget.
    fn category(&self) -> Option<Category> {
        None
    }
}
