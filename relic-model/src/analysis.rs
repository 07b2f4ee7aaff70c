use std::fmt;

use crate::error::{ModelError, Result};

/// Physical condition grade reported by the appraiser.
///
/// The five standard grades cover almost everything a vision model returns;
/// anything else ("Like New", "For Parts", ...) is carried verbatim in
/// [`Condition::Other`] so downstream lookup tables can still map it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum Condition {
    Excellent,
    VeryGood,
    #[default]
    Good,
    Fair,
    Poor,
    Other(String),
}

impl Condition {
    pub fn from_label(label: &str) -> Self {
        let key: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "excellent" => Condition::Excellent,
            "verygood" => Condition::VeryGood,
            "good" => Condition::Good,
            "fair" => Condition::Fair,
            "poor" => Condition::Poor,
            _ => Condition::Other(label.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Condition::Excellent => "Excellent",
            Condition::VeryGood => "Very Good",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
            Condition::Poor => "Poor",
            Condition::Other(label) => label,
        }
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::from_label(&value)
    }
}

impl From<&str> for Condition {
    fn from(value: &str) -> Self {
        Condition::from_label(value)
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Suggested asking price with the appraiser's justification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PriceEstimate {
    pub low: f64,
    pub high: f64,
    pub recommended: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub reasoning: String,
}

impl PriceEstimate {
    pub fn is_ordered(&self) -> bool {
        self.low <= self.recommended && self.recommended <= self.high
    }

    /// Enforces `low <= recommended <= high`.
    ///
    /// Negative or non-finite values are rejected. An inverted range is
    /// swapped and the recommendation clamped into it; the returned flag is
    /// `true` when anything had to be adjusted.
    pub fn normalized(mut self) -> Result<(Self, bool)> {
        for (field, value) in [
            ("low", self.low),
            ("high", self.high),
            ("recommended", self.recommended),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidPrice(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }

        let mut adjusted = false;
        if self.low > self.high {
            std::mem::swap(&mut self.low, &mut self.high);
            adjusted = true;
        }
        let clamped = self.recommended.clamp(self.low, self.high);
        if clamped != self.recommended {
            self.recommended = clamped;
            adjusted = true;
        }
        Ok((self, adjusted))
    }
}

/// Structured appraisal produced for one batch of photos.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ItemAnalysis {
    pub title: String,
    pub description: String,
    pub category: String,
    pub era: String,
    pub condition: Condition,
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "one_or_many::deserialize",
            skip_serializing_if = "Vec::is_empty"
        )
    )]
    pub condition_details: Vec<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, deserialize_with = "one_or_many::deserialize")
    )]
    pub keywords: Vec<String>,
    pub suggested_price: PriceEstimate,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub brand_or_maker: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "one_or_many::deserialize",
            skip_serializing_if = "Vec::is_empty"
        )
    )]
    pub materials: Vec<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub measurements: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "one_or_many::deserialize",
            skip_serializing_if = "Vec::is_empty"
        )
    )]
    pub flaws: Vec<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub reasoning: Option<String>,
}

// Vision models are inconsistent about list fields: accept a bare string,
// a list, or null.
#[cfg(feature = "serde")]
mod one_or_many {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
            None => Vec::new(),
            Some(OneOrMany::One(value)) if value.trim().is_empty() => Vec::new(),
            Some(OneOrMany::One(value)) => vec![value],
            Some(OneOrMany::Many(values)) => values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(low: f64, recommended: f64, high: f64) -> PriceEstimate {
        PriceEstimate {
            low,
            high,
            recommended,
            reasoning: String::new(),
        }
    }

    #[test]
    fn condition_labels_are_case_and_space_insensitive() {
        assert_eq!(Condition::from_label("very good"), Condition::VeryGood);
        assert_eq!(Condition::from_label("Very_Good"), Condition::VeryGood);
        assert_eq!(Condition::from_label(" EXCELLENT "), Condition::Excellent);
        assert_eq!(
            Condition::from_label("Like New"),
            Condition::Other("Like New".into())
        );
        assert_eq!(Condition::VeryGood.label(), "Very Good");
    }

    #[test]
    fn ordered_price_is_left_alone() {
        let (normalized, adjusted) = price(10.0, 20.0, 30.0).normalized().unwrap();
        assert!(!adjusted);
        assert_eq!(normalized, price(10.0, 20.0, 30.0));
    }

    #[test]
    fn inverted_range_is_swapped_and_recommendation_clamped() {
        let (normalized, adjusted) = price(50.0, 80.0, 20.0).normalized().unwrap();
        assert!(adjusted);
        assert_eq!(normalized.low, 20.0);
        assert_eq!(normalized.high, 50.0);
        assert_eq!(normalized.recommended, 50.0);
        assert!(normalized.is_ordered());
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(price(-1.0, 5.0, 10.0).normalized().is_err());
        assert!(price(1.0, f64::NAN, 10.0).normalized().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn analysis_accepts_scalar_list_fields() {
        let raw = r#"{
            "title": "Brass lamp",
            "description": "A lamp",
            "category": "Vintage Home Decor",
            "era": "1970s",
            "condition": "Very Good",
            "conditionDetails": "Light patina",
            "keywords": ["brass", "lamp"],
            "materials": null,
            "suggestedPrice": {"low": 40, "high": 90, "recommended": 65}
        }"#;
        let analysis: ItemAnalysis = serde_json::from_str(raw).unwrap();
        assert_eq!(analysis.condition, Condition::VeryGood);
        assert_eq!(analysis.condition_details, vec!["Light patina".to_string()]);
        assert!(analysis.materials.is_empty());
        assert_eq!(analysis.suggested_price.reasoning, "");
        assert!(analysis.reasoning.is_none());
    }
}
