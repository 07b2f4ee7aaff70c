//! Marketplace listing payload assembly: title limits, HTML description and
//! the static category / condition lookup tables.

use relic_model::{Condition, ItemAnalysis};

/// Longest title the marketplace accepts.
pub const MAX_TITLE_CHARS: usize = 80;
/// Most pictures a single listing may reference.
pub const MAX_PICTURES: usize = 12;

const DEFAULT_CATEGORY_ID: &str = "20081";
const DEFAULT_CONDITION_ID: &str = "3000";

const CATEGORY_IDS: &[(&str, &str)] = &[
    ("women's vintage clothing", "175759"),
    ("men's vintage clothing", "175758"),
    ("vintage jewelry", "48579"),
    ("vintage accessories", "175756"),
    ("vintage home decor", "20679"),
    ("collectibles", "1"),
];

const CONDITION_IDS: &[(&str, &str)] = &[
    ("new", "1000"),
    ("like new", "1500"),
    ("excellent", "2000"),
    ("very good", "2500"),
    ("good", "3000"),
    ("acceptable", "4000"),
    ("fair", "4000"),
    ("for parts", "7000"),
    ("poor", "7000"),
];

/// Listing defaults that come from seller configuration rather than the
/// appraisal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    pub postal_code: String,
    pub dispatch_time_max: u32,
    pub max_pictures: usize,
    pub paypal_email: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            postal_code: "90210".to_string(),
            dispatch_time_max: 3,
            max_pictures: MAX_PICTURES,
            paypal_email: None,
        }
    }
}

/// Everything needed to create one fixed-price listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPayload {
    pub title: String,
    pub description_html: String,
    pub category_id: String,
    pub condition_id: String,
    pub start_price: f64,
    pub picture_urls: Vec<String>,
    pub postal_code: String,
    pub dispatch_time_max: u32,
    pub quantity: u32,
    pub paypal_email: Option<String>,
}

impl ListingPayload {
    pub fn from_analysis(analysis: &ItemAnalysis, picture_urls: Vec<String>, settings: &RelaySettings) -> Self {
        Self {
            title: truncate_title(&analysis.title),
            description_html: description_html(analysis),
            category_id: category_id(&analysis.category).to_string(),
            condition_id: condition_id(&analysis.condition).to_string(),
            start_price: analysis.suggested_price.recommended,
            picture_urls,
            postal_code: settings.postal_code.clone(),
            dispatch_time_max: settings.dispatch_time_max,
            quantity: 1,
            paypal_email: settings.paypal_email.clone(),
        }
    }
}

/// Collapse whitespace runs, then cut `title` to exactly
/// [`MAX_TITLE_CHARS`] characters ending in `...` when anything was removed.
/// The ellipsis never follows a space.
pub fn truncate_title(title: &str) -> String {
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title;
    }
    let keep = MAX_TITLE_CHARS - 3;
    let mut kept: String = title.chars().take(keep).collect();
    if kept.ends_with(' ') {
        // Spaces are single after collapsing, so the next char is a word char.
        kept.pop();
        kept.extend(title.chars().nth(keep));
    }
    format!("{kept}...")
}

pub fn category_id(category: &str) -> &'static str {
    let key = category.trim().to_lowercase();
    CATEGORY_IDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, id)| *id)
        .unwrap_or(DEFAULT_CATEGORY_ID)
}

pub fn condition_id(condition: &Condition) -> &'static str {
    let key = condition.label().trim().to_lowercase();
    CONDITION_IDS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, id)| *id)
        .unwrap_or(DEFAULT_CONDITION_ID)
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn description_html(analysis: &ItemAnalysis) -> String {
    let mut html = String::new();
    html.push_str("<div style=\"font-family: Arial, sans-serif; max-width: 800px;\">\n");
    html.push_str(&format!("<h2>{}</h2>\n", escape_html(&analysis.title)));
    html.push_str(&format!("<p>{}</p>\n", escape_html(&analysis.description)));

    html.push_str("<h3>Details</h3>\n<ul>\n");
    let mut detail = |label: &str, value: &str| {
        if !value.trim().is_empty() {
            html.push_str(&format!(
                "<li><strong>{label}:</strong> {}</li>\n",
                escape_html(value)
            ));
        }
    };
    detail("Era", &analysis.era);
    detail("Condition", analysis.condition.label());
    if let Some(brand) = &analysis.brand_or_maker {
        detail("Brand/Maker", brand);
    }
    detail("Materials", &analysis.materials.join(", "));
    if let Some(measurements) = &analysis.measurements {
        detail("Measurements", measurements);
    }
    html.push_str("</ul>\n");

    if !analysis.condition_details.is_empty() {
        html.push_str("<h3>Condition Notes</h3>\n");
        html.push_str(&bullet_list(&analysis.condition_details));
    }
    if !analysis.flaws.is_empty() {
        html.push_str("<h3>Please Note</h3>\n");
        html.push_str(&bullet_list(&analysis.flaws));
    }
    html.push_str("</div>");
    html
}

fn bullet_list(entries: &[String]) -> String {
    let items: String = entries
        .iter()
        .map(|entry| format!("<li>{}</li>\n", escape_html(entry)))
        .collect();
    format!("<ul>\n{items}</ul>\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_analysis;

    #[test]
    fn long_titles_are_cut_to_the_limit() {
        let long = "Vintage ".repeat(20);
        let title = truncate_title(&long);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert!(title.ends_with("..."));

        let exact = "x".repeat(MAX_TITLE_CHARS);
        assert_eq!(truncate_title(&exact), exact);
    }

    #[test]
    fn cut_next_to_a_space_still_fills_the_limit() {
        let title = format!("{}   {}", "a".repeat(76), "b".repeat(10));
        let cut = truncate_title(&title);
        assert_eq!(cut.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(cut, format!("{}b...", "a".repeat(76)));

        assert_eq!(truncate_title("  Brass   Table\tLamp "), "Brass Table Lamp");
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let title = "é".repeat(100);
        let cut = truncate_title(&title);
        assert_eq!(cut.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn lookup_tables_fall_back_to_defaults() {
        assert_eq!(category_id("Vintage Jewelry"), "48579");
        assert_eq!(category_id("  collectibles "), "1");
        assert_eq!(category_id("Spaceships"), DEFAULT_CATEGORY_ID);

        assert_eq!(condition_id(&Condition::VeryGood), "2500");
        assert_eq!(condition_id(&Condition::Other("Like New".into())), "1500");
        assert_eq!(condition_id(&Condition::Other("mystery".into())), DEFAULT_CONDITION_ID);
    }

    #[test]
    fn description_escapes_markup_and_lists_flaws() {
        let mut analysis = sample_analysis("Lamp <b>", 40.0);
        analysis.flaws = vec!["chip on base".into()];
        analysis.materials = vec!["brass".into(), "glass".into()];
        analysis.brand_or_maker = Some("Stiffel & Co".into());

        let html = description_html(&analysis);
        assert!(html.contains("<h2>Lamp &lt;b&gt;</h2>"));
        assert!(html.contains("Stiffel &amp; Co"));
        assert!(html.contains("<strong>Materials:</strong> brass, glass"));
        assert!(html.contains("<h3>Please Note</h3>"));
        assert!(!html.contains("Condition Notes"));
    }

    #[test]
    fn payload_uses_recommended_price_and_settings() {
        let analysis = sample_analysis("Lamp", 95.0);
        let payload = ListingPayload::from_analysis(&analysis, vec!["u1".into()], &RelaySettings::default());
        assert_eq!(payload.start_price, 95.0);
        assert_eq!(payload.category_id, "1");
        assert_eq!(payload.condition_id, "3000");
        assert_eq!(payload.postal_code, "90210");
        assert_eq!(payload.quantity, 1);
    }
}
