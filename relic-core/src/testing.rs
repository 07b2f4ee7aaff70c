//! Fixtures shared by unit tests across modules.

use relic_model::{Condition, ItemAnalysis, PriceEstimate, VintageItem};

pub fn sample_analysis(title: &str, recommended: f64) -> ItemAnalysis {
    ItemAnalysis {
        title: title.to_string(),
        description: "desc".into(),
        category: "Collectibles".into(),
        era: "1970s".into(),
        condition: Condition::Good,
        condition_details: Vec::new(),
        keywords: vec!["vintage".into()],
        suggested_price: PriceEstimate {
            low: recommended / 2.0,
            high: recommended * 2.0,
            recommended,
            reasoning: String::new(),
        },
        brand_or_maker: None,
        materials: Vec::new(),
        measurements: None,
        flaws: Vec::new(),
        reasoning: None,
    }
}

pub fn sample_item(title: &str, recommended: f64) -> VintageItem {
    VintageItem::new(
        vec![format!("/photos/{title}.jpg")],
        sample_analysis(title, recommended),
    )
}
