//! Curated category keyword lists and first-match classification.
//!
//! Lookup order is fixed: `ai`, then `finance`, then `politics`; the first list with a
//! hit wins and anything unmatched is `other`. Matching is a case-insensitive substring
//! test, except that short ASCII keywords (three characters or fewer, e.g. "ai", "fed",
//! "dow") must not touch another ASCII letter or digit, so that "said" or "window" do not
//! match while "AIエージェント" still does.

use crate::ingest::types::Category;

pub const AI_KEYWORDS: &[&str] = &[
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "large language model",
    "generative ai",
    "ai",
    "llm",
    "gpt",
    "chatgpt",
    "openai",
    "gemini",
    "claude",
    "anthropic",
    "deepmind",
    "copilot",
    "cursor",
    "neural",
    "transformer",
    "diffusion",
    "chatbot",
    "agent",
    "nvidia",
    "gpu",
    "semiconductor",
    "inference",
    "robot",
    "hugging face",
    "mistral",
    "人工知能",
    "機械学習",
    "深層学習",
    "生成ai",
    "大規模言語モデル",
    "ロボット",
];

pub const FINANCE_KEYWORDS: &[&str] = &[
    "economy",
    "economic",
    "market",
    "stock",
    "fed",
    "inflation",
    "gdp",
    "tariff",
    "earnings",
    "investment",
    "wall street",
    "crypto",
    "bitcoin",
    "interest rate",
    "bond",
    "treasury",
    "recession",
    "bank",
    "financial",
    "nasdaq",
    "s&p",
    "dow",
    "yen",
    "日銀",
    "金融",
    "為替",
    "経済",
    "金利",
    "インフレ",
    "景気",
    "物価",
    "日経平均",
];

pub const POLITICS_KEYWORDS: &[&str] = &[
    "politic",
    "election",
    "congress",
    "senate",
    "parliament",
    "president",
    "white house",
    "prime minister",
    "minister",
    "legislation",
    "policy",
    "diplomacy",
    "sanction",
    "summit",
    "government",
    "trade deal",
    "国会",
    "内閣",
    "選挙",
    "政策",
    "外交",
    "首相",
];

/// Classify free text (a topic label or an article headline) into a category.
pub fn classify(text: &str) -> Category {
    let lower = text.to_lowercase();
    for (category, list) in [
        (Category::Ai, AI_KEYWORDS),
        (Category::Finance, FINANCE_KEYWORDS),
        (Category::Politics, POLITICS_KEYWORDS),
    ] {
        if list.iter().any(|kw| contains_keyword(&lower, kw)) {
            return category;
        }
    }
    Category::Other
}

/// Case-insensitive keyword containment. `haystack_lower` must already be lowercased.
pub fn contains_keyword(haystack_lower: &str, keyword: &str) -> bool {
    let kw = keyword.trim().to_lowercase();
    if kw.is_empty() {
        return false;
    }
    let needs_boundary = kw.is_ascii() && kw.chars().count() <= 3;
    if !needs_boundary {
        return haystack_lower.contains(&kw);
    }
    haystack_lower.match_indices(&kw).any(|(start, m)| {
        let before = haystack_lower[..start].chars().next_back();
        let after = haystack_lower[start + m.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric()) && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}
