//! # Relic Core
//!
//! Photo-intake pipeline for vintage and secondhand items: watch a folder
//! for new photos, appraise each batch with a vision-capable reasoning
//! service, persist the result as a website listing, optionally relay it to
//! a marketplace, and archive the source photos.
//!
//! ## Architecture
//!
//! - [`watch`]: debounced folder watching that yields [`relic_model::ImageBatch`]es
//! - [`analysis`]: single-pass and two-stage appraisal
//! - [`store`]: JSON-snapshot listing store with atomic writes
//! - [`relay`]: marketplace listing creation (eBay Trading API)
//! - [`lifecycle`]: the controller tying the above together, sale polling, and
//!   operator actions on existing listings
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use relic_core::analysis::{AnalysisOptions, AnalysisOrchestrator, AnthropicClient, AnthropicSettings};
//!
//! async fn appraise(paths: Vec<std::path::PathBuf>) -> relic_core::Result<()> {
//!     let client = AnthropicClient::new(AnthropicSettings::new("sk-ant-..."))?;
//!     let orchestrator = AnalysisOrchestrator::new(Arc::new(client));
//!     let analysis = orchestrator.analyze(&paths, &AnalysisOptions::default()).await?;
//!     println!("{} (~${})", analysis.title, analysis.suggested_price.recommended);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Reasoning-service appraisal of photo batches
pub mod analysis;

/// Error types and error handling utilities
pub mod error;

/// Atomic file writes
pub mod fsutil;

/// Intake lifecycle controller, side records, sale polling and listing management
pub mod lifecycle;

/// Marketplace relay and the eBay Trading API client
pub mod relay;

/// Durable listing store
pub mod store;

/// Folder watching and photo batching
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RelicError, Result};

pub use analysis::{AnalysisMode, AnalysisOptions, AnalysisOrchestrator, AnswerProvider, ReasoningService};
pub use lifecycle::{
    AutoLister, BatchReport, IntakeOutcome, IntakePipeline, LifecycleConfig, ListingManager, RelayStatus, SideRecords,
};
pub use relay::{EbayCredentials, EbayTradingClient, MarketplaceApi, MarketplaceRelay, RelaySettings};
pub use store::{ListingStore, SoldTransition};
pub use watch::{FolderWatchConfig, FolderWatcher, WatchEvent, validate_folder};
