//! Summary prompt and reply parsing.

use std::fmt::Write as _;

use serde::Deserialize;

use crate::error::ParseError;
use crate::ingest::types::{CandidateItem, Summary};

pub fn build_summary_prompt(item: &CandidateItem, content: &str) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Summarize the article below for a busy reader.");
    let _ = writeln!(
        p,
        "Reply with a single JSON object and nothing else:\n\
         {{\"headline\": str, \"key_points\": [str, ...], \"detailed_summary\": str, \"why_it_matters\": str}}\n"
    );
    let _ = writeln!(p, "Title: {}", item.title);
    let _ = writeln!(p, "Source: {}", item.source);
    let _ = writeln!(p, "URL: {}\n", item.url);
    p.push_str(content);
    p
}

#[derive(Deserialize)]
struct RawSummary {
    headline: String,
    key_points: Vec<String>,
    detailed_summary: String,
    why_it_matters: String,
}

/// Accepts bare JSON or JSON wrapped in prose / code fences. Every field must be non-empty.
pub fn parse_summary(reply: &str) -> Result<Summary, ParseError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(ParseError::new("summary", "no JSON object in reply")),
    };
    let raw: RawSummary =
        serde_json::from_str(json).map_err(|e| ParseError::new("summary", e.to_string()))?;

    let key_points: Vec<String> = raw
        .key_points
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    let summary = Summary {
        headline: raw.headline.trim().to_string(),
        key_points,
        detailed_summary: raw.detailed_summary.trim().to_string(),
        why_it_matters: raw.why_it_matters.trim().to_string(),
    };

    for (field, empty) in [
        ("headline", summary.headline.is_empty()),
        ("key_points", summary.key_points.is_empty()),
        ("detailed_summary", summary.detailed_summary.is_empty()),
        ("why_it_matters", summary.why_it_matters.is_empty()),
    ] {
        if empty {
            return Err(ParseError::new("summary", format!("`{field}` is empty")));
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_json_parses() {
        let reply = "Sure!\n```json\n{\"headline\":\" H \",\"key_points\":[\"a\",\" \"],\
                     \"detailed_summary\":\"d\",\"why_it_matters\":\"w\"}\n```";
        let s = parse_summary(reply).unwrap();
        assert_eq!(s.headline, "H");
        assert_eq!(s.key_points, vec!["a".to_string()]);
    }

    #[test]
    fn missing_or_empty_fields_fail() {
        assert!(parse_summary("{\"headline\":\"h\"}").is_err());
        assert!(parse_summary(
            "{\"headline\":\"h\",\"key_points\":[],\"detailed_summary\":\"d\",\"why_it_matters\":\"w\"}"
        )
        .is_err());
        assert!(parse_summary("no json here").is_err());
    }
}
