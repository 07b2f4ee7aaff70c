//! Turning free-form model answers into typed values.

use once_cell::sync::Lazy;
use regex::Regex;
use relic_model::{Condition, ItemAnalysis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RelicError, Result};

/// Marker a triage answer uses to ask the operator for help.
pub const QUESTIONS_MARKER: &str = "QUESTIONS:";

static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+[.)]\s*(.+?)\s*$").expect("numbered line regex should compile")
});

/// Remove a surrounding markdown code fence (```json ... ```), if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Outermost `{ ... }` span of the text: first opening brace to last
/// closing brace.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a full appraisal. Fenced and unfenced JSON parse identically; the
/// price estimate is normalised so `low <= recommended <= high` holds.
pub fn parse_analysis(text: &str) -> Result<ItemAnalysis> {
    let body = strip_code_fence(text);
    let json = extract_json_object(body)
        .ok_or_else(|| RelicError::Parse("response contained no JSON object".into()))?;

    let mut analysis: ItemAnalysis =
        serde_json::from_str(json).map_err(|err| RelicError::Parse(err.to_string()))?;

    if analysis.title.trim().is_empty() {
        return Err(RelicError::Parse("analysis has an empty title".into()));
    }

    let (price, adjusted) = analysis.suggested_price.clone().normalized()?;
    if adjusted {
        warn!(
            target: "relic::analysis",
            low = price.low,
            recommended = price.recommended,
            high = price.high,
            "price estimate was out of order; normalised"
        );
    }
    analysis.suggested_price = price;
    Ok(analysis)
}

/// Numbered questions following [`QUESTIONS_MARKER`], in order. Empty when
/// the marker is absent.
pub fn extract_questions(text: &str) -> Vec<String> {
    let Some(idx) = text.find(QUESTIONS_MARKER) else {
        return Vec::new();
    };
    text[idx + QUESTIONS_MARKER.len()..]
        .lines()
        .filter_map(|line| NUMBERED_LINE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|question| !question.is_empty())
        .collect()
}

/// Coarse classification produced by the triage stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triage {
    #[serde(default = "Triage::default_category")]
    pub category: String,
    #[serde(default = "Triage::default_era")]
    pub era: String,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
}

impl Triage {
    fn default_category() -> String {
        "Vintage Item".to_string()
    }

    fn default_era() -> String {
        "Unknown".to_string()
    }
}

impl Default for Triage {
    fn default() -> Self {
        Self {
            category: Self::default_category(),
            era: Self::default_era(),
            condition: Condition::Good,
            item_type: None,
        }
    }
}

/// Best-effort triage parse; anything unreadable falls back to defaults.
pub fn parse_triage(text: &str) -> Triage {
    extract_json_object(strip_code_fence(text))
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANALYSIS: &str = r#"{
        "title": "1960s Pyrex Butterprint Mixing Bowl",
        "description": "Turquoise on white.",
        "category": "Vintage Home Decor",
        "era": "1960s",
        "condition": "Excellent",
        "keywords": ["pyrex", "butterprint"],
        "suggestedPrice": {"low": 25, "high": 60, "recommended": 40, "reasoning": "recent sales"}
    }"#;

    #[test]
    fn fenced_and_unfenced_json_parse_identically() {
        let fenced = format!("```json\n{ANALYSIS}\n```");
        let bare_fence = format!("```\n{ANALYSIS}\n```");
        let plain = parse_analysis(ANALYSIS).unwrap();
        assert_eq!(parse_analysis(&fenced).unwrap(), plain);
        assert_eq!(parse_analysis(&bare_fence).unwrap(), plain);
        assert_eq!(plain.condition, Condition::Excellent);
        assert_eq!(plain.suggested_price.recommended, 40.0);
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let chatty = format!("Here is the appraisal:\n{ANALYSIS}\nLet me know!");
        assert_eq!(parse_analysis(&chatty).unwrap().era, "1960s");
    }

    #[test]
    fn non_json_is_a_parse_error() {
        assert!(matches!(
            parse_analysis("I cannot identify this item."),
            Err(RelicError::Parse(_))
        ));
        assert!(matches!(
            parse_analysis(r#"{"title": "missing everything else"}"#),
            Err(RelicError::Parse(_))
        ));
    }

    #[test]
    fn out_of_order_prices_are_normalised() {
        let inverted = ANALYSIS.replace(
            r#""low": 25, "high": 60, "recommended": 40"#,
            r#""low": 60, "high": 25, "recommended": 90"#,
        );
        let analysis = parse_analysis(&inverted).unwrap();
        assert_eq!(analysis.suggested_price.low, 25.0);
        assert_eq!(analysis.suggested_price.high, 60.0);
        assert_eq!(analysis.suggested_price.recommended, 60.0);

        let negative = ANALYSIS.replace(r#""low": 25"#, r#""low": -5"#);
        assert!(matches!(parse_analysis(&negative), Err(RelicError::Parse(_))));
    }

    #[test]
    fn questions_are_extracted_in_order() {
        let text = "I need more detail.\nQUESTIONS:\n1. Is there a maker's mark?\n2) What are the dimensions?\nnot numbered\n3.   Any chips?  ";
        assert_eq!(
            extract_questions(text),
            vec![
                "Is there a maker's mark?".to_string(),
                "What are the dimensions?".to_string(),
                "Any chips?".to_string(),
            ]
        );
        assert!(extract_questions("1. no marker here").is_empty());
    }

    #[test]
    fn triage_falls_back_to_defaults() {
        assert_eq!(parse_triage("no json at all"), Triage::default());

        let partial = parse_triage(r#"{"category": "Vintage Jewelry", "condition": "fair"}"#);
        assert_eq!(partial.category, "Vintage Jewelry");
        assert_eq!(partial.era, "Unknown");
        assert_eq!(partial.condition, Condition::Fair);
    }
}
