// src/preference.rs
//! Phased preference model, recomputed from the selection history on every run.
//!
//! Phase 0 (< 3 entries) learns nothing. Phase 1 scores topics/sources and boosts
//! frequently chosen topics. Phase 2 adds suppression, a category distribution and
//! preferred sources. Phase 3 applies time decay, normalizes scores to [0, 1],
//! tightens suppression and reserves serendipity slots.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::history::{HistoryLog, SelectionHistoryEntry};
use crate::ingest::types::{Category, SearchHints};
use crate::keywords;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressionRule {
    /// Minimum times offered before a topic can be suppressed.
    pub min_offered: u32,
    /// Selection rate strictly below this suppresses.
    pub max_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceConfig {
    /// History lengths at which phases 1, 2 and 3 start.
    pub phase_thresholds: [usize; 3],
    pub topic_weight: f64,
    pub source_weight: f64,
    pub score_cap: f64,
    pub boost_min_selections: u32,
    pub suppression_phase2: SuppressionRule,
    pub suppression_phase3: SuppressionRule,
    pub preferred_sources: usize,
    pub decay_window_days: i64,
    pub recent_weight: f64,
    pub older_weight: f64,
    pub serendipity_ratio: f64,
    /// Retained history entries; older ones are folded into archived counts.
    pub history_retention: usize,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            phase_thresholds: [3, 7, 14],
            topic_weight: 0.1,
            source_weight: 0.1,
            score_cap: 1.0,
            boost_min_selections: 3,
            suppression_phase2: SuppressionRule {
                min_offered: 5,
                max_rate: 0.2,
            },
            suppression_phase3: SuppressionRule {
                min_offered: 3,
                max_rate: 0.1,
            },
            preferred_sources: 5,
            decay_window_days: 7,
            recent_weight: 1.0,
            older_weight: 0.5,
            serendipity_ratio: 0.2,
            history_retention: 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceState {
    pub learning_phase: u8,
    pub topic_scores: BTreeMap<String, f64>,
    pub source_scores: BTreeMap<String, f64>,
    pub category_distribution: BTreeMap<Category, f64>,
    pub boosted_keywords: Vec<String>,
    pub suppressed_keywords: Vec<String>,
    pub preferred_sources: Vec<String>,
    pub serendipity_ratio: f64,
    pub last_updated: Option<NaiveDate>,
}

impl PreferenceState {
    pub fn search_hints(&self) -> SearchHints {
        SearchHints {
            boosted_keywords: self.boosted_keywords.clone(),
            suppressed_keywords: self.suppressed_keywords.clone(),
            run_date: None,
        }
    }

    pub fn topic_score(&self, topic: &str) -> f64 {
        self.topic_scores.get(topic).copied().unwrap_or(0.0)
    }

    pub fn source_score(&self, source: &str) -> f64 {
        self.source_scores.get(source.trim()).copied().unwrap_or(0.0)
    }
}

/// Persisted shape of `preferences.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceDocument {
    pub selection_history: HistoryLog,
    #[serde(alias = "learned_preferences")]
    pub state: PreferenceState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseUpdate {
    pub state: PreferenceState,
    /// `(old, new)` when the phase changed.
    pub transition: Option<(u8, u8)>,
}

#[derive(Default)]
struct Counts {
    offered: BTreeMap<String, u32>,
    selected: BTreeMap<String, u32>,
    weighted_selected: BTreeMap<String, f64>,
    weighted_sources: BTreeMap<String, f64>,
}

pub struct PreferenceModel {
    cfg: PreferenceConfig,
}

impl PreferenceModel {
    pub fn new(cfg: PreferenceConfig) -> Self {
        Self { cfg }
    }

    pub fn phase_for(&self, history_len: usize) -> u8 {
        let [p1, p2, p3] = self.cfg.phase_thresholds;
        if history_len >= p3 {
            3
        } else if history_len >= p2 {
            2
        } else if history_len >= p1 {
            1
        } else {
            0
        }
    }

    fn weight_for(&self, phase: u8, date: Option<NaiveDate>, newest: Option<NaiveDate>) -> f64 {
        if phase < 3 {
            return 1.0;
        }
        match (date, newest) {
            (Some(d), Some(n)) if (n - d).num_days() <= self.cfg.decay_window_days => {
                self.cfg.recent_weight
            }
            _ => self.cfg.older_weight,
        }
    }

    fn count(&self, history: &HistoryLog, phase: u8, newest: Option<NaiveDate>) -> Counts {
        let mut c = Counts::default();

        let arch = &history.archived;
        let aw = self.weight_for(phase, arch.latest_date, newest);
        for (t, n) in &arch.topics_offered {
            *c.offered.entry(t.clone()).or_default() += n;
        }
        for (t, n) in &arch.topics_selected {
            *c.selected.entry(t.clone()).or_default() += n;
            *c.weighted_selected.entry(t.clone()).or_default() += f64::from(*n) * aw;
        }
        for (s, n) in &arch.sources_selected {
            *c.weighted_sources.entry(s.clone()).or_default() += f64::from(*n) * aw;
        }

        for e in &history.entries {
            self.count_entry(&mut c, e, self.weight_for(phase, Some(e.date), newest));
        }
        c
    }

    fn count_entry(&self, c: &mut Counts, e: &SelectionHistoryEntry, w: f64) {
        for t in e.offered_topic_set() {
            *c.offered.entry(t).or_default() += 1;
        }
        for t in e.selected_topic_set() {
            *c.selected.entry(t.clone()).or_default() += 1;
            *c.weighted_selected.entry(t).or_default() += w;
        }
        for s in e.source_set() {
            *c.weighted_sources.entry(s).or_default() += w;
        }
    }

    /// Pure function of `history` and the config.
    pub fn compute(&self, history: &HistoryLog) -> PreferenceState {
        let phase = self.phase_for(history.len());
        let newest = history.newest_date();
        let mut state = PreferenceState {
            learning_phase: phase,
            last_updated: newest,
            ..Default::default()
        };
        if phase == 0 {
            return state;
        }

        let counts = self.count(history, phase, newest);

        state.topic_scores = counts
            .weighted_selected
            .iter()
            .map(|(t, w)| (t.clone(), (w * self.cfg.topic_weight).min(self.cfg.score_cap)))
            .collect();
        state.source_scores = counts
            .weighted_sources
            .iter()
            .map(|(s, w)| (s.clone(), (w * self.cfg.source_weight).min(self.cfg.score_cap)))
            .collect();

        let mut boosted: Vec<(&String, u32)> = counts
            .selected
            .iter()
            .filter(|(_, n)| **n >= self.cfg.boost_min_selections)
            .map(|(t, n)| (t, *n))
            .collect();
        boosted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        state.boosted_keywords = boosted.into_iter().map(|(t, _)| t.clone()).collect();

        if phase >= 2 {
            let rule = if phase >= 3 {
                self.cfg.suppression_phase3
            } else {
                self.cfg.suppression_phase2
            };
            let mut suppressed: Vec<String> = counts
                .offered
                .iter()
                .filter(|(t, offered)| {
                    let selected = counts.selected.get(*t).copied().unwrap_or(0);
                    **offered >= rule.min_offered
                        && f64::from(selected) / f64::from(**offered) < rule.max_rate
                })
                .map(|(t, _)| t.clone())
                .collect();
            suppressed.sort();
            state.suppressed_keywords = suppressed;

            state.category_distribution = category_distribution(&counts.weighted_selected);

            let mut sources: Vec<(&String, f64)> =
                counts.weighted_sources.iter().map(|(s, w)| (s, *w)).collect();
            sources.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            state.preferred_sources = sources
                .into_iter()
                .take(self.cfg.preferred_sources)
                .map(|(s, _)| s.clone())
                .collect();
        }

        if phase >= 3 {
            normalize_by_max(&mut state.topic_scores);
            normalize_by_max(&mut state.source_scores);
            state.serendipity_ratio = self.cfg.serendipity_ratio;
        }

        state
    }

    /// Recompute and report a phase transition against the previously persisted state.
    pub fn update(&self, previous: &PreferenceState, history: &HistoryLog) -> PhaseUpdate {
        let state = self.compute(history);
        let old = previous.learning_phase;
        let transition = (old != state.learning_phase).then_some((old, state.learning_phase));
        if let Some((from, to)) = transition {
            tracing::info!(
                target: "preference",
                from,
                to,
                history = history.len(),
                "learning phase transition"
            );
        }
        PhaseUpdate { state, transition }
    }
}

/// Weighted selected-topic counts per category, normalized to fractions.
fn category_distribution(weighted: &BTreeMap<String, f64>) -> BTreeMap<Category, f64> {
    let mut by_cat: BTreeMap<Category, f64> = BTreeMap::new();
    for (topic, w) in weighted {
        *by_cat.entry(keywords::classify(topic)).or_default() += w;
    }
    let total: f64 = by_cat.values().sum();
    if total <= 0.0 {
        return BTreeMap::new();
    }
    by_cat.values_mut().for_each(|v| *v /= total);
    by_cat
}

fn normalize_by_max(scores: &mut BTreeMap<String, f64>) {
    let max = scores.values().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        scores.values_mut().for_each(|v| *v /= max);
    }
}
