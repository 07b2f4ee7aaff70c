//! Prompt text sent to the reasoning service.

use super::parse::{QUESTIONS_MARKER, Triage};

const SCHEMA: &str = r#"{
  "title": "listing title, at most 80 characters",
  "description": "detailed description for buyers",
  "category": "item category",
  "era": "estimated era or decade",
  "condition": "Excellent | Very Good | Good | Fair | Poor",
  "conditionDetails": ["specific condition notes"],
  "keywords": ["search keywords"],
  "brandOrMaker": "brand or maker if identifiable",
  "materials": ["materials"],
  "measurements": "approximate dimensions if visible",
  "flaws": ["visible flaws"],
  "suggestedPrice": {
    "low": 0,
    "high": 0,
    "recommended": 0,
    "reasoning": "why this price"
  }
}"#;

fn platform_line(platforms: &[String]) -> String {
    if platforms.is_empty() {
        String::new()
    } else {
        format!("The listing will be posted on: {}.\n", platforms.join(", "))
    }
}

/// Single request producing the full appraisal.
pub fn appraisal_prompt(extended_thinking: bool, platforms: &[String]) -> String {
    let depth = if extended_thinking {
        "Think carefully about maker marks, construction details and comparable sales before answering.\n"
    } else {
        ""
    };
    format!(
        "You are an expert appraiser of vintage and secondhand items. \
         Examine the photos and produce a marketplace-ready appraisal.\n\
         {depth}{platforms}\
         Respond with only a JSON object in exactly this shape:\n{SCHEMA}",
        platforms = platform_line(platforms),
    )
}

/// Stage one: quick classification, or questions for the operator.
pub fn triage_prompt() -> String {
    format!(
        "Classify the item in these photos. If the photos are not enough to \
         identify it, reply with a line `{QUESTIONS_MARKER}` followed by a \
         numbered list of short questions for the seller. Otherwise respond \
         with only JSON: {{\"category\": \"...\", \"era\": \"...\", \
         \"condition\": \"...\", \"itemType\": \"...\"}}"
    )
}

/// Stage one, second round, with the operator's answers folded in.
pub fn refined_triage_prompt(answers: &[(String, String)]) -> String {
    let transcript = answers
        .iter()
        .map(|(question, answer)| format!("Q: {question}\nA: {answer}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "The seller answered your questions:\n\n{transcript}\n\n\
         Now classify the item. Respond with only JSON: {{\"category\": \"...\", \
         \"era\": \"...\", \"condition\": \"...\", \"itemType\": \"...\"}}"
    )
}

/// Stage two: full appraisal seeded with the triage result.
pub fn elaboration_prompt(triage: &Triage, platforms: &[String]) -> String {
    let item_type = triage.item_type.as_deref().unwrap_or("unspecified");
    format!(
        "You are an expert appraiser of vintage and secondhand items. \
         A first pass classified this item as:\n\
         - Category: {category}\n- Era: {era}\n- Condition: {condition}\n- Type: {item_type}\n\
         Verify or correct that classification from the photos, then produce \
         the full appraisal including a \"reasoning\" field explaining your \
         conclusions.\n{platforms}\
         Respond with only a JSON object in exactly this shape:\n{SCHEMA}",
        category = triage.category,
        era = triage.era,
        condition = triage.condition,
        platforms = platform_line(platforms),
    )
}
