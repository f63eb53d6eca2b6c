//! AI adapter: the single `complete(prompt) -> text` capability used for grounded
//! collection, ranking and summarization. Provider abstraction + file cache + daily limit.

use std::fs;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::CompletionConfig;
use crate::error::PipelineError;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Boxed future returned by completion calls.
pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Caller-side reply check; only replies it accepts are worth keeping.
pub type ReplyCheck<'c> = dyn Fn(&str) -> bool + Send + Sync + 'c;

/// Trait object used by the pipeline stages (and stubbed in tests).
pub trait CompletionClient: Send + Sync {
    /// Send a prompt and return the provider's free-text reply.
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a>;
    /// Like `complete`, but a caching client stores (and replays) only replies `accept` approves.
    fn complete_checked<'a>(&'a self, prompt: &'a str, accept: &'a ReplyCheck<'a>) -> CompletionFuture<'a> {
        let _ = accept;
        self.complete(prompt)
    }
    /// Provider name for diagnostics/logs.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynCompletion = Arc<dyn CompletionClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `config.enabled == false`, returns a disabled client.
/// * Else builds the real provider wrapped with caching + daily limit.
///
/// `grounded` asks the provider to back its answer with live web search when it can.
pub fn build_client_from_config(
    config: &CompletionConfig,
    grounded: bool,
) -> std::result::Result<DynCompletion, PipelineError> {
    let test_mock = std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false);
    if test_mock || config.provider_normalized() == "mock" {
        let reply = config
            .mock_reply
            .clone()
            .unwrap_or_else(|| "No items (mock)".to_string());
        return Ok(Arc::new(MockProvider::fixed(reply)));
    }

    if !config.enabled {
        return Ok(Arc::new(DisabledClient));
    }

    let api_key = config.resolve_api_key()?;
    let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
    let cache_dir = if grounded {
        config.cache_dir.join("grounded")
    } else {
        config.cache_dir.clone()
    };

    match config.provider_normalized().as_str() {
        "gemini" => {
            let provider = GeminiProvider::new(api_key, config.model.as_deref(), timeout)
                .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?
                .with_grounding(grounded);
            Ok(Arc::new(CachingClient::new(provider, cache_dir, config.daily_limit)))
        }
        "openai" => {
            let provider = OpenAiProvider::new(api_key, config.model.as_deref(), timeout)
                .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;
            Ok(Arc::new(CachingClient::new(provider, cache_dir, config.daily_limit)))
        }
        other => Err(PipelineError::Configuration(format!(
            "unsupported completion provider: {other}"
        ))),
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does a *real* remote call. Separated so we can reuse the same
/// caching wrapper for every backend.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a>;
    fn name(&self) -> &'static str;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("news-curator/0.1")
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .build()
        .context("building completion http client")
}

/// Gemini provider (generateContent API), optionally with Google Search grounding.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    grounding: bool,
}

impl GeminiProvider {
    /// `model_override`: defaults to gemini-2.5-flash.
    pub fn new(api_key: String, model_override: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            model: model_override.unwrap_or("gemini-2.5-flash").to_string(),
            grounding: false,
        })
    }

    pub fn with_grounding(mut self, on: bool) -> Self {
        self.grounding = on;
        self
    }
}

impl Provider for GeminiProvider {
    fn fetch<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Part<'a> {
                text: &'a str,
            }
            #[derive(Serialize)]
            struct Content<'a> {
                parts: Vec<Part<'a>>,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                contents: Vec<Content<'a>>,
                #[serde(skip_serializing_if = "Vec::is_empty")]
                tools: Vec<serde_json::Value>,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                candidates: Vec<Candidate>,
            }
            #[derive(Deserialize)]
            struct Candidate {
                content: Option<RespContent>,
            }
            #[derive(Deserialize)]
            struct RespContent {
                #[serde(default)]
                parts: Vec<RespPart>,
            }
            #[derive(Deserialize)]
            struct RespPart {
                text: Option<String>,
            }

            let req = Req {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
                tools: if self.grounding {
                    vec![serde_json::json!({ "google_search": {} })]
                } else {
                    Vec::new()
                },
            };
            let url = format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            );
            let body: Resp = self
                .http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(&req)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .context("gemini request")?
                .json()
                .await
                .context("gemini response body")?;

            let text: String = body
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                .unwrap_or_default();
            if text.trim().is_empty() {
                bail!("gemini returned an empty reply");
            }
            Ok(text)
        })
    }
    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// OpenAI provider (uses Chat Completions API).
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// `model_override`: defaults to gpt-4o-mini.
    pub fn new(api_key: String, model_override: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        })
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: vec![Msg {
                    role: "user",
                    content: prompt,
                }],
                temperature: 0.2,
            };

            let body: Resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .context("openai request")?
                .json()
                .await
                .context("openai response body")?;

            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            if content.trim().is_empty() {
                bail!("openai returned an empty reply");
            }
            Ok(content)
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Always fails; used when completion is disabled.
pub struct DisabledClient;

impl CompletionClient for DisabledClient {
    fn complete<'a>(&'a self, _prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(async { Err(anyhow!("completion provider disabled")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// Deterministic provider for tests/local runs: canned text, or a closure over the prompt.
#[derive(Clone)]
pub struct MockProvider {
    responder: Arc<Responder>,
}

impl MockProvider {
    pub fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            responder: Arc::new(move |_| Ok(reply.clone())),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(f),
        }
    }
}

impl Provider for MockProvider {
    fn fetch<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        let out = (self.responder)(prompt);
        Box::pin(async move { out })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

impl CompletionClient for MockProvider {
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        self.fetch(prompt)
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching client wrapper (file cache + daily limit)
// ------------------------------------------------------------

/// Counter state is guarded by a `Mutex`; cache files are written atomically.
pub struct CachingClient<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Arc<Mutex<DailyCounter>>,
}

impl<P: Provider> CachingClient<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            tracing::warn!(error = %e, dir = %cache_dir.display(), "completion cache dir unavailable");
        }
        let counter = Arc::new(Mutex::new(
            load_daily_counter(&cache_dir).unwrap_or_default(),
        ));
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    async fn complete_impl(&self, prompt: &str, accept: Option<&ReplyCheck<'_>>) -> Result<String> {
        let accepted = |text: &str| accept.map_or(true, |f| f(text));

        // 1) Cache lookup (hits do not count against the daily limit).
        let key = cache_key(prompt);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            if accepted(&hit.text) {
                tracing::debug!(provider = self.inner.name(), key = %key, "completion cache hit");
                return Ok(hit.text);
            }
            tracing::debug!(provider = self.inner.name(), key = %key, "cached reply rejected; refetching");
        }

        // 2) Check daily limit.
        {
            let mut g = self
                .counter
                .lock()
                .map_err(|_| anyhow!("completion counter poisoned"))?;
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_daily_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit_max {
                bail!(
                    "daily completion limit reached ({} calls)",
                    self.daily_limit_max
                );
            }
        }

        // 3) Real call.
        let fresh = self.inner.fetch(prompt).await?;
        if accepted(&fresh) {
            if let Err(e) = write_cache_file(&self.cache_dir, &key, &CachedReply { text: fresh.clone() }) {
                tracing::warn!(error = %e, "completion cache write failed");
            }
        }
        if let Ok(mut g) = self.counter.lock() {
            g.count = g.count.saturating_add(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
        Ok(fresh)
    }
}

impl<P: Provider> CompletionClient for CachingClient<P> {
    fn complete<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(self.complete_impl(prompt, None))
    }
    fn complete_checked<'a>(&'a self, prompt: &'a str, accept: &'a ReplyCheck<'a>) -> CompletionFuture<'a> {
        Box::pin(self.complete_impl(prompt, Some(accept)))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedReply {
    text: String,
}

fn cache_key(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    digest.iter().take(12).map(|b| format!("{b:02x}")).collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<CachedReply> {
    let path = cache_path(dir, key);
    let mut file = fs::File::open(path).ok()?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).ok()?;
    serde_json::from_str(&buf).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &CachedReply) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}
impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}
impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(s.as_bytes())?;
    fs::rename(tmp, p)?;
    Ok(())
}
