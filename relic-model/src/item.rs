use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::analysis::ItemAnalysis;
use crate::ids::ItemId;

/// Image files discovered within one debounce window, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ImageBatch {
    pub paths: Vec<PathBuf>,
    pub detected_at: DateTime<Utc>,
}

impl ImageBatch {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            detected_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// An appraised item: the analysis plus the photos it was produced from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct VintageItem {
    pub id: ItemId,
    pub images: Vec<String>,
    pub analysis: ItemAnalysis,
    pub created_at: DateTime<Utc>,
}

impl VintageItem {
    pub fn new(images: Vec<String>, analysis: ItemAnalysis) -> Self {
        Self {
            id: ItemId::new(),
            images,
            analysis,
            created_at: Utc::now(),
        }
    }
}
