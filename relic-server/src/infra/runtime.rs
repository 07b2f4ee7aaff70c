//! Wiring from a loaded [`Config`] to the core components.

use std::fmt;
use std::sync::Arc;

use relic_config::{Config, ReasoningConfig, WatchConfig};
use relic_core::analysis::{AnthropicClient, AnthropicSettings};
use relic_core::{
    AnalysisOrchestrator, AnswerProvider, EbayCredentials, EbayTradingClient, FolderWatchConfig, IntakePipeline,
    LifecycleConfig, ListingManager, ListingStore, MarketplaceRelay, ReasoningService, RelaySettings, Result, SideRecords,
};
use tracing::info;

/// Long-lived components shared by the HTTP surface and the CLI commands.
#[derive(Clone)]
pub struct Runtime {
    pub config: Arc<Config>,
    pub store: Arc<ListingStore>,
    pub records: Arc<SideRecords>,
    pub relay: Option<Arc<MarketplaceRelay>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("store", &self.store)
            .field("marketplace", &self.relay.is_some())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Open the listing store and build the marketplace relay when
    /// credentials are configured.
    pub async fn open(config: Config) -> Result<Self> {
        let storage = &config.storage;
        tokio::fs::create_dir_all(storage.data_dir()).await?;
        let store = Arc::new(ListingStore::open(storage.listings_file()).await?);
        let records = Arc::new(SideRecords::new(
            storage.drafts_dir(),
            storage.active_listings_dir(),
            storage.shipping_file(),
        ));

        let relay = match &config.marketplace {
            Some(marketplace) => {
                let credentials = EbayCredentials {
                    app_id: marketplace.app_id.clone(),
                    cert_id: marketplace.cert_id.clone(),
                    dev_id: marketplace.dev_id.clone(),
                    auth_token: marketplace.auth_token.clone(),
                    sandbox: marketplace.sandbox,
                };
                let client = EbayTradingClient::new(credentials, marketplace.timeout)?;
                let settings = RelaySettings {
                    postal_code: marketplace.postal_code.clone(),
                    paypal_email: marketplace.paypal_email.clone(),
                    ..RelaySettings::default()
                };
                info!(sandbox = marketplace.sandbox, "marketplace relay configured");
                Some(Arc::new(MarketplaceRelay::new(Arc::new(client), settings)))
            }
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            records,
            relay,
        })
    }

    pub fn reasoning_service(&self) -> Result<Option<Arc<dyn ReasoningService>>> {
        reasoning_service(&self.config.reasoning)
    }

    pub fn pipeline(
        &self,
        service: Arc<dyn ReasoningService>,
        answers: Option<Arc<dyn AnswerProvider>>,
    ) -> Arc<IntakePipeline> {
        let mut orchestrator = AnalysisOrchestrator::new(service);
        if let Some(answers) = answers {
            orchestrator = orchestrator.with_answer_provider(answers);
        }
        Arc::new(IntakePipeline::new(
            Arc::new(orchestrator),
            Arc::clone(&self.store),
            self.relay.clone(),
            Arc::clone(&self.records),
        ))
    }

    pub fn listing_manager(&self) -> Arc<ListingManager> {
        Arc::new(ListingManager::new(
            Arc::clone(&self.store),
            Arc::clone(&self.records),
            self.relay.clone(),
        ))
    }

    pub fn watch_config(&self) -> FolderWatchConfig {
        watch_config(&self.config.watch)
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        let automation = &self.config.automation;
        let mut lifecycle = LifecycleConfig::new(self.config.storage.archive_dir());
        lifecycle.auto_relay = automation.auto_post;
        lifecycle.notify_on_sale = automation.notify_on_sale;
        lifecycle.sale_poll_interval = automation.sale_poll_interval;
        lifecycle
    }
}

/// The configured reasoning service, or `None` without an API key.
pub fn reasoning_service(reasoning: &ReasoningConfig) -> Result<Option<Arc<dyn ReasoningService>>> {
    let Some(api_key) = reasoning.api_key.as_ref() else {
        return Ok(None);
    };
    let settings = AnthropicSettings {
        api_key: api_key.clone(),
        base_url: reasoning.base_url.clone(),
        deep_model: reasoning.model.clone(),
        triage_model: reasoning.triage_model.clone(),
        timeout: reasoning.timeout,
    };
    let client: Arc<dyn ReasoningService> = Arc::new(AnthropicClient::new(settings)?);
    Ok(Some(client))
}

pub fn watch_config(watch: &WatchConfig) -> FolderWatchConfig {
    FolderWatchConfig {
        debounce_window: watch.debounce,
        stability_window: watch.stability,
        ..FolderWatchConfig::default()
    }
    .with_extensions(&watch.extensions)
}
