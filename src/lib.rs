//! news-curator: a scheduled, preference-learning news curation pipeline.
//!
//! Stages: [`ingest`] → [`dedup`] → [`select`] (driven by [`preference`]) → [`enrich`] →
//! [`store`], orchestrated by [`pipeline`]. [`legacy`] is the digest fallback mode and
//! [`api`] the HTTP trigger surface.

pub mod ai_adapter;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod history;
pub mod ingest;
pub mod keywords;
pub mod legacy;
pub mod pipeline;
pub mod preference;
pub mod select;
pub mod store;
pub mod telemetry;

pub use error::{ParseError, PipelineError, Stage};
pub use pipeline::{CuratorPipeline, RunMode, RunReport};
