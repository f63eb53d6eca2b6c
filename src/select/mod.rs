// src/select/mod.rs
//! Category-balanced selection over a ranked candidate list.

pub mod ranker;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ingest::types::{CandidateItem, Category};
use crate::keywords;
use crate::preference::PreferenceState;

pub use ranker::{parse_url_references, CompletionRanker, PreferenceRanker, Ranker};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub category_minimums: BTreeMap<Category, usize>,
    pub target_total: usize,
    pub max_total: usize,
    /// Topic score at or above which a topic counts as a high interest.
    pub high_interest_threshold: f64,
    pub boost_bonus: f64,
    pub suppress_penalty: f64,
    pub source_weight: f64,
    /// How many top-scored topics define "on profile" for serendipity picks.
    pub serendipity_top_topics: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            category_minimums: BTreeMap::from([
                (Category::Ai, 5),
                (Category::Finance, 4),
                (Category::Politics, 2),
            ]),
            target_total: 12,
            max_total: 15,
            high_interest_threshold: 0.5,
            boost_bonus: 0.5,
            suppress_penalty: 0.5,
            source_weight: 0.5,
            serendipity_top_topics: 5,
        }
    }
}

/// Whether `topic` occurs in the item's title or description.
pub fn item_matches_topic(item_text_lower: &str, topic: &str) -> bool {
    keywords::contains_keyword(item_text_lower, topic)
}

#[derive(Debug, Default)]
pub struct Selection {
    pub items: Vec<CandidateItem>,
    /// Categories whose minimum could not be met, with the missing count.
    pub shortfalls: BTreeMap<Category, usize>,
    pub serendipity: usize,
}

pub struct Selector {
    cfg: SelectionConfig,
}

impl Selector {
    pub fn new(cfg: SelectionConfig) -> Self {
        Self { cfg }
    }

    /// `ranked` holds indices into `candidates`, best first. Unranked candidates are not eligible.
    pub fn select(
        &self,
        candidates: Vec<CandidateItem>,
        ranked: &[usize],
        prefs: &PreferenceState,
    ) -> Selection {
        // rank position per eligible candidate, first occurrence wins
        let mut seen = HashSet::new();
        let order: Vec<usize> = ranked
            .iter()
            .copied()
            .filter(|&i| i < candidates.len() && seen.insert(i))
            .collect();

        let mut used: HashSet<usize> = HashSet::new();
        let mut picked: Vec<usize> = Vec::new();
        let mut shortfalls = BTreeMap::new();

        // 1) category minimums, each from its own bucket
        let mut minimum_total = 0;
        for (cat, &min) in &self.cfg.category_minimums {
            minimum_total += min;
            let got: Vec<usize> = order
                .iter()
                .copied()
                .filter(|i| candidates[*i].category == *cat && !used.contains(i))
                .take(min)
                .collect();
            if got.len() < min {
                shortfalls.insert(*cat, min - got.len());
                tracing::info!(target: "select", category = %cat, wanted = min, got = got.len(), "category short; not backfilled");
            }
            used.extend(got.iter().copied());
            picked.extend(got);
        }

        // 2) serendipity: off-profile items, newest first
        let mut serendipity = 0;
        if prefs.learning_phase >= 3 && prefs.serendipity_ratio > 0.0 {
            let slots = (self.cfg.target_total as f64 * prefs.serendipity_ratio).round() as usize;
            let top = top_topics(prefs, self.cfg.serendipity_top_topics);
            let mut off_profile: Vec<usize> = order
                .iter()
                .copied()
                .filter(|i| !used.contains(i))
                .filter(|i| {
                    let text = candidates[*i].searchable_text();
                    !top.iter().any(|t| item_matches_topic(&text, t))
                })
                .collect();
            off_profile.sort_by(|a, b| candidates[*b].published_at.cmp(&candidates[*a].published_at));
            for i in off_profile.into_iter().take(slots) {
                used.insert(i);
                picked.push(i);
                serendipity += 1;
            }
        }

        // 3) open slots in rank order; the count is fixed so short categories stay short
        let open = self
            .cfg
            .target_total
            .saturating_sub(minimum_total + serendipity);
        let fill: Vec<usize> = order
            .iter()
            .copied()
            .filter(|i| !used.contains(i))
            .take(open)
            .collect();
        picked.extend(fill);

        // 4) hard cap, then present in rank order
        picked.truncate(self.cfg.max_total);
        let position: std::collections::HashMap<usize, usize> =
            order.iter().enumerate().map(|(pos, i)| (*i, pos)).collect();
        picked.sort_by_key(|i| position.get(i).copied().unwrap_or(usize::MAX));

        let chosen: HashSet<usize> = picked.iter().copied().collect();
        let mut slots: Vec<Option<CandidateItem>> = candidates.into_iter().map(Some).collect();
        let items: Vec<CandidateItem> = picked
            .iter()
            .filter_map(|i| slots.get_mut(*i).and_then(Option::take))
            .collect();

        tracing::info!(
            target: "select",
            selected = items.len(),
            eligible = order.len(),
            serendipity,
            dropped = order.len() - chosen.len(),
            "selection done"
        );
        Selection {
            items,
            shortfalls,
            serendipity,
        }
    }
}

/// Highest-scored topics (boosted topics first), used to recognise on-profile items.
fn top_topics(prefs: &PreferenceState, n: usize) -> Vec<String> {
    let mut scored: Vec<(&String, f64)> = prefs.topic_scores.iter().map(|(t, s)| (t, *s)).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let mut out: Vec<String> = prefs.boosted_keywords.clone();
    for (t, _) in scored {
        if out.len() >= n.max(prefs.boosted_keywords.len()) {
            break;
        }
        if !out.contains(t) {
            out.push(t.clone());
        }
    }
    out
}
