//! Error types at the pipeline's component seams.

use std::fmt;

use thiserror::Error;

use crate::store::StoreError;

/// Pipeline stage, used to give `EmptyResult` context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Aggregate,
    Dedup,
    Select,
    Enrich,
    Legacy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Aggregate => "aggregate",
            Stage::Dedup => "dedup",
            Stage::Select => "select",
            Stage::Enrich => "enrich",
            Stage::Legacy => "legacy",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing credential or invalid configuration; raised before any side effect.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    #[error("{stage} stage produced no items: {detail}")]
    EmptyResult { stage: Stage, detail: String },
}

impl PipelineError {
    pub fn empty(stage: Stage, detail: impl Into<String>) -> Self {
        PipelineError::EmptyResult {
            stage,
            detail: detail.into(),
        }
    }
}

/// Unparsable ranking reply or malformed summary. Recovered per item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse {what}: {reason}")]
pub struct ParseError {
    pub what: &'static str,
    pub reason: String,
}

impl ParseError {
    pub fn new(what: &'static str, reason: impl Into<String>) -> Self {
        Self {
            what,
            reason: reason.into(),
        }
    }
}
