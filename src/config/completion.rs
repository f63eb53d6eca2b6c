// src/config/completion.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::resolve_secret;
use crate::error::PipelineError;

fn default_daily_limit() -> u32 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub enabled: bool,
    /// "gemini" | "openai" | "mock" (case-insensitive)
    pub provider: String,
    pub model: Option<String>,
    /// "ENV" means: read from GEMINI_API_KEY / OPENAI_API_KEY (by provider)
    pub api_key: String,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    pub cache_dir: PathBuf,
    pub request_timeout_secs: u64,
    /// Canned reply used by the "mock" provider.
    pub mock_reply: Option<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "gemini".to_string(),
            model: None,
            api_key: "ENV".to_string(),
            daily_limit: default_daily_limit(),
            cache_dir: PathBuf::from("cache/completion"),
            request_timeout_secs: 60,
            mock_reply: None,
        }
    }
}

impl CompletionConfig {
    pub fn provider_normalized(&self) -> String {
        self.provider.trim().to_ascii_lowercase()
    }

    /// Resolve the API key for the configured provider; the mock provider needs none.
    pub fn resolve_api_key(&self) -> Result<String, PipelineError> {
        match self.provider_normalized().as_str() {
            "gemini" => resolve_secret(&self.api_key, "GEMINI_API_KEY"),
            "openai" => resolve_secret(&self.api_key, "OPENAI_API_KEY"),
            "mock" => Ok(String::new()),
            other => Err(PipelineError::Configuration(format!(
                "unsupported completion provider: {other}"
            ))),
        }
    }
}
