//! Core data model definitions shared across Relic crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod analysis;
pub mod api;
pub mod error;
pub mod ids;
pub mod item;
pub mod listing;
pub mod sale;

// Intentionally curated re-exports for downstream consumers.
pub use analysis::{Condition, ItemAnalysis, PriceEstimate};
pub use api::{ApiResponse, ApiStatus};
pub use error::{ModelError, Result as ModelResult};
pub use ids::ItemId;
pub use item::{ImageBatch, VintageItem};
pub use listing::{Listing, ListingStats, ListingStatus, MarketplaceRef};
pub use sale::{ShippingNotice, SoldItem};
