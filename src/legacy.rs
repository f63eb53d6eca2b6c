// src/legacy.rs
//! Legacy digest mode: per-category briefs sent to the (grounded) completion provider,
//! each reply persisted as a markdown digest, plus a read-aloud script where configured.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ai_adapter::DynCompletion;
use crate::error::{PipelineError, Stage};
use crate::store::{upsert, DocumentStore};

/// When a category runs. Weekdays count from Monday = 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "every", rename_all = "snake_case")]
pub enum Schedule {
    Daily,
    Weekday { weekday: u32 },
    /// Runs when the day of the year is divisible by `n`.
    NDays { n: u32 },
}

impl Schedule {
    pub fn is_due(&self, date: NaiveDate) -> bool {
        match self {
            Schedule::Daily => true,
            Schedule::Weekday { weekday } => date.weekday().num_days_from_monday() == *weekday,
            Schedule::NDays { n } => *n > 0 && date.ordinal() % n == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestCategory {
    pub id: String,
    pub name: String,
    pub schedule: Schedule,
    #[serde(default)]
    pub generate_script: bool,
    /// Prompt text; `{today}` and `{yesterday}` are substituted.
    pub brief: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    pub categories: Vec<DigestCategory>,
    /// A reply containing any of these has nothing worth a script.
    pub no_news_markers: Vec<String>,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        let cat = |id: &str, name: &str, schedule, script, brief: &str| DigestCategory {
            id: id.to_string(),
            name: name.to_string(),
            schedule,
            generate_script: script,
            brief: brief.to_string(),
        };
        Self {
            categories: vec![
                cat(
                    "ai",
                    "AI Tech News",
                    Schedule::Daily,
                    true,
                    "Today is {today}. Collect technical release and update news about AI developer \
                     tools (Claude, Gemini, ChatGPT, Cursor, Copilot) published between {yesterday} \
                     and {today}, from Japanese and US sources only. For each item give a title, the \
                     site and the URL. If nothing qualifies, write \"No major releases\".",
                ),
                cat(
                    "politics",
                    "Politics & Economy News",
                    Schedule::Daily,
                    false,
                    "Today is {today}. Summarize the most important politics and economy news from \
                     Japan and the US published between {yesterday} and {today}, with URLs. If \
                     nothing qualifies, write \"No major news\".",
                ),
                cat(
                    "papers",
                    "AI Papers Survey",
                    Schedule::Weekday { weekday: 0 },
                    false,
                    "Today is {today}. Survey notable AI research papers from the past week with a \
                     two-line takeaway and a link each. If nothing qualifies, write \"No notable papers\".",
                ),
                cat(
                    "serendipity",
                    "Serendipity News",
                    Schedule::NDays { n: 3 },
                    false,
                    "Today is {today}. Find three surprising stories from science, culture or \
                     technology published between {yesterday} and {today}, outside AI and politics, \
                     with URLs.",
                ),
            ],
            no_news_markers: vec![
                "No major releases".to_string(),
                "No major news".to_string(),
                "No notable papers".to_string(),
            ],
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyReport {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct LegacyDigest {
    cfg: LegacyConfig,
    grounded: DynCompletion,
    writer: DynCompletion,
    store: Arc<dyn DocumentStore>,
}

fn script_prompt(name: &str, digest: &str) -> String {
    format!(
        "You write the script for a short morning news show ({name}).\n\
         Turn the notes below into a friendly read-aloud script: a two or three sentence \
         opening, one section per story (what happened, context, why it matters), and a short \
         closing. Do not include URLs or emoji.\n\n{digest}"
    )
}

impl LegacyDigest {
    /// `grounded` collects the digests; `writer` turns a digest into a script.
    pub fn new(
        cfg: LegacyConfig,
        grounded: DynCompletion,
        writer: DynCompletion,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            cfg,
            grounded,
            writer,
            store,
        }
    }

    pub fn due_categories(&self, date: NaiveDate) -> Vec<&DigestCategory> {
        self.cfg
            .categories
            .iter()
            .filter(|c| c.schedule.is_due(date))
            .collect()
    }

    pub async fn run(&self, date: NaiveDate) -> Result<LegacyReport, PipelineError> {
        let today = date.to_string();
        let yesterday = (date - Duration::days(1)).to_string();
        let mut report = LegacyReport::default();

        for cat in &self.cfg.categories {
            if !cat.schedule.is_due(date) {
                tracing::debug!(target: "legacy", category = %cat.id, "not scheduled today");
                report.skipped.push(cat.id.clone());
                continue;
            }

            let prompt = cat
                .brief
                .replace("{today}", &today)
                .replace("{yesterday}", &yesterday);
            let content = match self.grounded.complete(&prompt).await {
                Ok(c) if !c.trim().is_empty() => c,
                Ok(_) => {
                    tracing::info!(target: "legacy", category = %cat.id, "empty reply; skipping");
                    report.skipped.push(cat.id.clone());
                    continue;
                }
                Err(e) => {
                    tracing::warn!(target: "legacy", error = ?e, category = %cat.id, "collection failed; skipping");
                    report.skipped.push(cat.id.clone());
                    continue;
                }
            };

            let path = format!("news/{today}-{}.md", cat.id);
            let doc = format!("# {} - {today}\n\n{content}", cat.name);
            upsert(
                self.store.as_ref(),
                &path,
                &doc,
                &format!("Add {} for {today}", cat.name),
            )
            .await?;
            tracing::info!(target: "legacy", path = %path, "digest saved");
            report.written.push(path);

            if !cat.generate_script {
                continue;
            }
            if self.cfg.no_news_markers.iter().any(|m| content.contains(m.as_str())) {
                tracing::info!(target: "legacy", category = %cat.id, "no major news; skipping script");
                continue;
            }
            match self.writer.complete(&script_prompt(&cat.name, &content)).await {
                Ok(script) if !script.trim().is_empty() => {
                    let path = format!("scripts/{today}-{}.md", cat.id);
                    let doc = format!("# {} Script - {today}\n\n{script}", cat.name);
                    upsert(
                        self.store.as_ref(),
                        &path,
                        &doc,
                        &format!("Add {} script for {today}", cat.name),
                    )
                    .await?;
                    report.written.push(path);
                }
                Ok(_) => tracing::info!(target: "legacy", category = %cat.id, "empty script reply"),
                Err(e) => tracing::warn!(target: "legacy", error = ?e, category = %cat.id, "script generation failed"),
            }
        }

        if report.written.is_empty() {
            return Err(PipelineError::empty(Stage::Legacy, "no digest was written"));
        }
        Ok(report)
    }
}
