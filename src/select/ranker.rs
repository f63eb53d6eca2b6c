//! Candidate ordering: a local preference-weighted ranker and a completion-backed one.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use async_trait::async_trait;

use crate::ai_adapter::DynCompletion;
use crate::error::ParseError;
use crate::ingest::types::CandidateItem;
use crate::preference::PreferenceState;
use crate::select::{item_matches_topic, SelectionConfig};

#[async_trait]
pub trait Ranker: Send + Sync {
    /// Indices into `candidates`, best first. Omitted candidates are not eligible.
    async fn rank(&self, candidates: &[CandidateItem], prefs: &PreferenceState) -> Vec<usize>;
    fn name(&self) -> &'static str;
}

pub struct PreferenceRanker {
    cfg: SelectionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ItemScore {
    high_interest: usize,
    score: f64,
}

impl PreferenceRanker {
    pub fn new(cfg: SelectionConfig) -> Self {
        Self { cfg }
    }

    fn score(&self, it: &CandidateItem, prefs: &PreferenceState) -> ItemScore {
        let text = it.searchable_text();
        let mut high_interest = 0;
        let mut score = 0.0;

        for (topic, s) in &prefs.topic_scores {
            if !item_matches_topic(&text, topic) {
                continue;
            }
            score += s;
            let boosted = prefs.boosted_keywords.contains(topic);
            if *s >= self.cfg.high_interest_threshold || boosted {
                high_interest += 1;
            }
        }
        for kw in &prefs.boosted_keywords {
            if item_matches_topic(&text, kw) {
                score += self.cfg.boost_bonus;
                // boosted keywords without a score entry still count as an interest
                if !prefs.topic_scores.contains_key(kw) {
                    high_interest += 1;
                }
            }
        }
        for kw in &prefs.suppressed_keywords {
            if item_matches_topic(&text, kw) {
                score -= self.cfg.suppress_penalty;
            }
        }
        score += self.cfg.source_weight * prefs.source_score(&it.source);

        ItemScore {
            high_interest,
            score,
        }
    }
}

#[async_trait]
impl Ranker for PreferenceRanker {
    async fn rank(&self, candidates: &[CandidateItem], prefs: &PreferenceState) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..candidates.len()).collect();

        if prefs.learning_phase >= 2 {
            let scores: Vec<ItemScore> = candidates.iter().map(|c| self.score(c, prefs)).collect();
            idx.sort_by(|&a, &b| {
                scores[b]
                    .high_interest
                    .cmp(&scores[a].high_interest)
                    .then_with(|| scores[b].score.total_cmp(&scores[a].score))
                    .then_with(|| candidates[b].published_at.cmp(&candidates[a].published_at))
                    .then_with(|| candidates[a].url.cmp(&candidates[b].url))
            });
        } else {
            idx.sort_by(|&a, &b| {
                candidates[b]
                    .published_at
                    .cmp(&candidates[a].published_at)
                    .then_with(|| {
                        prefs
                            .source_score(&candidates[b].source)
                            .total_cmp(&prefs.source_score(&candidates[a].source))
                    })
                    .then_with(|| candidates[a].url.cmp(&candidates[b].url))
            });
        }
        idx
    }

    fn name(&self) -> &'static str {
        "preference"
    }
}

/// Delegates ordering to the completion provider and trusts only URLs it was shown.
pub struct CompletionRanker {
    client: DynCompletion,
    target_total: usize,
}

impl CompletionRanker {
    pub fn new(client: DynCompletion, target_total: usize) -> Self {
        Self {
            client,
            target_total,
        }
    }

    pub fn build_prompt(&self, candidates: &[CandidateItem], prefs: &PreferenceState) -> String {
        let mut p = String::new();
        let _ = writeln!(
            p,
            "Rank the news candidates below for this reader and pick the best {}.",
            self.target_total
        );
        if !prefs.boosted_keywords.is_empty() {
            let _ = writeln!(p, "Reader favours: {}", prefs.boosted_keywords.join(", "));
        }
        if !prefs.suppressed_keywords.is_empty() {
            let _ = writeln!(p, "Reader ignores: {}", prefs.suppressed_keywords.join(", "));
        }
        if !prefs.preferred_sources.is_empty() {
            let _ = writeln!(p, "Preferred sources: {}", prefs.preferred_sources.join(", "));
        }
        let _ = writeln!(
            p,
            "Reply with one line per pick, best first, formatted exactly as `URL: <url>`.\n"
        );
        for (i, c) in candidates.iter().enumerate() {
            let _ = writeln!(
                p,
                "{}. [{}] {} ({})\n   {}\n   URL: {}",
                i + 1,
                c.category,
                c.title,
                c.source,
                c.description,
                c.url
            );
        }
        p
    }
}

/// Map `URL: <url>` lines to candidate indices. First mention wins; unknown URLs are dropped.
pub fn parse_url_references(
    reply: &str,
    candidates: &[CandidateItem],
) -> Result<Vec<usize>, ParseError> {
    let by_url: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.url.trim(), i))
        .collect();

    let mut saw_reference = false;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in reply.lines() {
        let lower = line.to_ascii_lowercase();
        let Some(pos) = lower.find("url:") else {
            continue;
        };
        saw_reference = true;
        let url = line[pos + 4..]
            .trim()
            .trim_start_matches(['<', '[', '(', '`'])
            .trim_end_matches(['>', ']', ')', '`', '.', ',', ';']);
        match by_url.get(url) {
            Some(&i) if seen.insert(i) => out.push(i),
            Some(_) => {}
            None => tracing::debug!(target: "select", url, "ranking reply referenced unknown url"),
        }
    }
    if !saw_reference {
        return Err(ParseError::new("ranking reply", "no `URL:` lines"));
    }
    Ok(out)
}

#[async_trait]
impl Ranker for CompletionRanker {
    async fn rank(&self, candidates: &[CandidateItem], prefs: &PreferenceState) -> Vec<usize> {
        let prompt = self.build_prompt(candidates, prefs);
        let usable = |r: &str| parse_url_references(r, candidates).is_ok();
        let reply = match self.client.complete_checked(&prompt, &usable).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "select", error = ?e, provider = self.client.provider_name(), "ranking call failed");
                return Vec::new();
            }
        };
        match parse_url_references(&reply, candidates) {
            Ok(idx) => idx,
            Err(e) => {
                tracing::warn!(target: "select", error = %e, "ranking reply unusable");
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "completion"
    }
}
