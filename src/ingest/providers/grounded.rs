//! Free-text grounding collector: asks the completion provider (with web search
//! grounding) for a numbered list and parses it back into candidates.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ai_adapter::DynCompletion;
use crate::ingest::types::{CandidateItem, Category, SearchHints, SourceProvider};

pub struct GroundedSearchProvider {
    name: String,
    category: Category,
    brief: String,
    completion: DynCompletion,
}

impl GroundedSearchProvider {
    pub fn new(name: &str, category: Category, brief: &str, completion: DynCompletion) -> Self {
        Self {
            name: name.to_string(),
            category,
            brief: brief.to_string(),
            completion,
        }
    }

    fn prompt(&self, max_items: usize, hints: &SearchHints) -> String {
        let today = hints.run_date.unwrap_or_else(|| Utc::now().date_naive());
        let mut p = format!(
            "Today is {today}. Collect up to {max_items} news items published in the last two days.\n\
             Focus: {}\n",
            self.brief
        );
        if !hints.boosted_keywords.is_empty() {
            p.push_str(&format!("Prioritize: {}\n", hints.boosted_keywords.join(", ")));
        }
        if !hints.suppressed_keywords.is_empty() {
            p.push_str(&format!("Deprioritize: {}\n", hints.suppressed_keywords.join(", ")));
        }
        p.push_str(
            "\nOutput format, one block per item:\n\
             1. <title>\n   📰 <site> | 💡 <short note>\n   URL: <article url>\n\n\
             Reply with \"no items\" if nothing qualifies.",
        );
        p
    }
}

/// One parsed block of the numbered reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedItem {
    pub title: String,
    pub site: Option<String>,
    pub note: Option<String>,
    pub url: String,
}

fn strip_brackets(s: &str) -> &str {
    s.trim()
        .trim_start_matches(['[', '<', '('])
        .trim_end_matches([']', '>', ')'])
        .trim()
}

/// Parse `N. title` / `📰 site | 💡 note` / `URL: ...` blocks. Blocks without a URL are skipped.
pub fn parse_numbered_list(reply: &str) -> Vec<ListedItem> {
    static RE_HEAD: OnceCell<Regex> = OnceCell::new();
    let re_head =
        RE_HEAD.get_or_init(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").expect("head regex"));

    let mut out = Vec::new();
    let mut title: Option<String> = None;
    let mut site = None;
    let mut note = None;

    for line in reply.lines() {
        let trimmed = line.trim();
        if let Some(c) = re_head.captures(line) {
            title = Some(strip_brackets(&c[1]).trim_matches('*').trim().to_string());
            site = None;
            note = None;
        } else if let Some(rest) = trimmed.strip_prefix("📰") {
            let mut parts = rest.splitn(2, '|');
            site = parts
                .next()
                .map(|s| strip_brackets(s).to_string())
                .filter(|s| !s.is_empty());
            note = parts
                .next()
                .map(|s| strip_brackets(s.trim().trim_start_matches("💡")).to_string())
                .filter(|s| !s.is_empty());
        } else if let Some(rest) = trimmed
            .strip_prefix("URL:")
            .or_else(|| trimmed.strip_prefix("url:"))
        {
            let url = strip_brackets(rest).to_string();
            if let Some(t) = title.take() {
                if url.starts_with("http") && !t.is_empty() {
                    out.push(ListedItem {
                        title: t,
                        site: site.take(),
                        note: note.take(),
                        url,
                    });
                }
            }
        }
    }
    out
}

#[async_trait]
impl SourceProvider for GroundedSearchProvider {
    async fn fetch(&self, max_items: usize, hints: &SearchHints) -> Result<Vec<CandidateItem>> {
        let prompt = self.prompt(max_items, hints);
        let has_lines = |r: &str| !parse_numbered_list(r).is_empty();
        let reply = self.completion.complete_checked(&prompt, &has_lines).await?;
        let now = Utc::now();
        let items = parse_numbered_list(&reply)
            .into_iter()
            .take(max_items)
            .map(|l| {
                let source = l.site.unwrap_or_else(|| self.name.clone());
                CandidateItem::new(l.title, l.url, source, now, self.category)
                    .with_description(l.note.unwrap_or_default())
            })
            .collect();
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Option<Category> {
        Some(self.category)
    }
}
