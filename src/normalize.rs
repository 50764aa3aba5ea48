use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());
static PAREN_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([\d,]+)\)").unwrap());

/// Collapse whitespace runs to one space and trim. Empty becomes `None`.
pub fn clean_text(text: Option<&str>) -> Option<String> {
    let text = text?;
    let cleaned = WHITESPACE.replace_all(text, " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Star score out of 5 from a CSS width like `width: 96%;` (100% = 5 stars).
pub fn percent_to_score(style: Option<&str>) -> Option<f64> {
    let caps = PERCENT.captures(style?)?;
    let percent: f64 = caps[1].parse().ok()?;
    Some(round2(percent / 20.0))
}

/// Integer from a parenthesized count such as `(1,234)`.
pub fn parse_count(text: Option<&str>) -> Option<u64> {
    let caps = PAREN_COUNT.captures(text?)?;
    caps[1].replace(',', "").parse().ok()
}

/// Comma-joined tags; an empty list gives an empty string.
pub fn join_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .filter_map(|t| clean_text(Some(t.as_ref())))
        .collect::<Vec<_>>()
        .join(",")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
