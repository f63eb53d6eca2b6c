// src/config/mod.rs
//! Pipeline configuration: one serde struct per component, every field defaulted,
//! loaded from TOML or JSON.

pub mod completion;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dedup::DedupConfig;
use crate::enrich::EnrichmentConfig;
use crate::error::PipelineError;
use crate::ingest::providers::SourceSpec;
use crate::ingest::AggregatorConfig;
use crate::legacy::LegacyConfig;
use crate::preference::PreferenceConfig;
use crate::select::SelectionConfig;

pub use completion::CompletionConfig;

pub const ENV_CONFIG_PATH: &str = "CURATOR_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/curator.toml";
pub const DEFAULT_JSON_PATH: &str = "config/curator.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the document store.
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
        }
    }
}

/// Which ranker orders candidates before category balancing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    #[default]
    Preference,
    Completion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Offset applied to UTC when deriving the run date (JST by default).
    pub utc_offset_hours: i32,
    pub store: StoreConfig,
    pub sources: Vec<SourceSpec>,
    pub aggregator: AggregatorConfig,
    pub dedup: DedupConfig,
    pub preference: PreferenceConfig,
    pub ranking: RankingMode,
    pub selection: SelectionConfig,
    pub enrichment: EnrichmentConfig,
    pub completion: CompletionConfig,
    pub legacy: LegacyConfig,
}

/// Without configured sources, a single grounded web-search source for AI news.
fn default_sources() -> Vec<SourceSpec> {
    vec![SourceSpec::Grounded {
        name: "Grounded search".to_string(),
        category: crate::ingest::types::Category::Ai,
        brief: "AI developer tools (Claude, Gemini, ChatGPT, Cursor, Copilot): new features, \
                releases, API and SDK updates, from Japanese and US sources"
            .to_string(),
    }]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 9,
            store: StoreConfig::default(),
            sources: default_sources(),
            aggregator: AggregatorConfig::default(),
            dedup: DedupConfig::default(),
            preference: PreferenceConfig::default(),
            ranking: RankingMode::default(),
            selection: SelectionConfig::default(),
            enrichment: EnrichmentConfig::default(),
            completion: CompletionConfig::default(),
            legacy: LegacyConfig::default(),
        }
    }
}

/// Load configuration from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load configuration using env var + fallbacks:
/// 1) $CURATOR_CONFIG_PATH
/// 2) config/curator.toml
/// 3) config/curator.json
/// 4) built-in defaults
pub fn load_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
    }
    Ok(PipelineConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing json config");
    }
    match toml::from_str(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!(toml_err))
            .context("unsupported config format"),
    }
}

/// Resolve a credential value. `"ENV"` (any case) reads `env_name`; empty or missing is fatal.
pub fn resolve_secret(value: &str, env_name: &str) -> std::result::Result<String, PipelineError> {
    let v = value.trim();
    let resolved = if v.eq_ignore_ascii_case("env") {
        std::env::var(env_name).unwrap_or_default()
    } else {
        v.to_string()
    };
    if resolved.trim().is_empty() {
        return Err(PipelineError::Configuration(format!(
            "missing credential: set {env_name}"
        )));
    }
    Ok(resolved)
}
