use std::{fmt, path::PathBuf, sync::Arc};

use relic_config::Config;
use relic_core::{IntakePipeline, ListingManager, ListingStore};

use crate::infra::runtime::Runtime;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<ListingStore>,
    /// Absent when no reasoning service is configured; `/api/analyze`
    /// answers 503 in that case.
    pub pipeline: Option<Arc<IntakePipeline>>,
    pub listings: Arc<ListingManager>,
    pub uploads_dir: PathBuf,
    /// Where the folder lifecycle moves processed photos.
    pub archive_dir: PathBuf,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("uploads_dir", &self.uploads_dir)
            .field("analysis_enabled", &self.pipeline.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(runtime: &Runtime, pipeline: Option<Arc<IntakePipeline>>) -> Self {
        Self {
            config: Arc::clone(&runtime.config),
            store: Arc::clone(&runtime.store),
            pipeline,
            listings: runtime.listing_manager(),
            uploads_dir: runtime.config.storage.uploads_dir(),
            archive_dir: runtime.config.storage.archive_dir(),
        }
    }

    pub fn marketplace_configured(&self) -> bool {
        self.listings.relay_configured()
    }
}
