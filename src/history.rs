//! history.rs: append-only selection history with a bounded retained window.
//!
//! Entries older than the retention bound are folded into [`ArchivedCounts`] so the
//! persisted document stays small while every count the preference model needs survives.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of user feedback: what was offered and what was picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionHistoryEntry {
    pub date: NaiveDate,
    #[serde(default)]
    pub candidate_topics: Vec<String>,
    #[serde(default)]
    pub selected_topics: Vec<String>,
    #[serde(default)]
    pub selected_sources: Vec<String>,
}

impl SelectionHistoryEntry {
    /// Normalized, de-duplicated selected topics.
    pub fn selected_topic_set(&self) -> BTreeSet<String> {
        normalize_all(&self.selected_topics)
    }

    /// Topics the user saw: candidates ∪ selected (a selected topic was necessarily offered).
    pub fn offered_topic_set(&self) -> BTreeSet<String> {
        let mut s = normalize_all(&self.candidate_topics);
        s.extend(self.selected_topic_set());
        s
    }

    pub fn source_set(&self) -> BTreeSet<String> {
        self.selected_sources
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

pub fn normalize_topic(t: &str) -> String {
    t.trim().to_lowercase()
}

fn normalize_all(v: &[String]) -> BTreeSet<String> {
    v.iter()
        .map(|t| normalize_topic(t))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Aggregate of folded entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchivedCounts {
    pub entries: usize,
    pub topics_offered: BTreeMap<String, u32>,
    pub topics_selected: BTreeMap<String, u32>,
    pub sources_selected: BTreeMap<String, u32>,
    pub latest_date: Option<NaiveDate>,
}

impl ArchivedCounts {
    fn fold(&mut self, e: &SelectionHistoryEntry) {
        self.entries += 1;
        for t in e.offered_topic_set() {
            *self.topics_offered.entry(t).or_default() += 1;
        }
        for t in e.selected_topic_set() {
            *self.topics_selected.entry(t).or_default() += 1;
        }
        for s in e.source_set() {
            *self.sources_selected.entry(s).or_default() += 1;
        }
        self.latest_date = self.latest_date.max(Some(e.date));
    }
}

/// Accepts either a bare array of entries (older documents) or `{entries, archived}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryRepr {
    Plain(Vec<SelectionHistoryEntry>),
    Log {
        #[serde(default)]
        entries: Vec<SelectionHistoryEntry>,
        #[serde(default)]
        archived: ArchivedCounts,
    },
}

impl From<HistoryRepr> for HistoryLog {
    fn from(r: HistoryRepr) -> Self {
        match r {
            HistoryRepr::Plain(entries) => HistoryLog {
                entries,
                archived: ArchivedCounts::default(),
            },
            HistoryRepr::Log { entries, archived } => HistoryLog { entries, archived },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HistoryRepr")]
pub struct HistoryLog {
    pub entries: Vec<SelectionHistoryEntry>,
    pub archived: ArchivedCounts,
}

impl HistoryLog {
    pub fn from_entries(entries: Vec<SelectionHistoryEntry>) -> Self {
        Self {
            entries,
            archived: ArchivedCounts::default(),
        }
    }

    /// Total history length, folded entries included.
    pub fn len(&self) -> usize {
        self.entries.len() + self.archived.entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn newest_date(&self) -> Option<NaiveDate> {
        self.entries
            .iter()
            .map(|e| e.date)
            .max()
            .max(self.archived.latest_date)
    }

    /// Fold all but the newest `retain` entries into the archive. Returns how many were folded.
    pub fn compact(&mut self, retain: usize) -> usize {
        if self.entries.len() <= retain {
            return 0;
        }
        self.entries.sort_by_key(|e| e.date);
        let excess = self.entries.len() - retain;
        for e in self.entries.drain(..excess) {
            self.archived.fold(&e);
        }
        excess
    }
}
