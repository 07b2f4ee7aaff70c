//! # Relic Server
//!
//! Photo-intake appraisal for vintage and secondhand items.
//!
//! - `serve` (default): HTTP API for uploads, appraisal and the shop
//! - `analyze`: appraise photos given on the command line and print the result
//! - `watch`: appraise each batch of photos dropped into a folder
//! - `auto`: full lifecycle (watch, appraise, list, relay, archive, sale polling)

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use relic_config::{Config, ConfigLoad, ConfigLoader};
use relic_core::{
    AnalysisMode, AnalysisOptions, AnalysisOrchestrator, AnswerProvider, AutoLister, FolderWatcher, IntakeOutcome,
    ReasoningService, RelayStatus, WatchEvent, validate_folder,
};
use relic_model::ItemAnalysis;
use relic_server::{
    AppState, Runtime, create_app,
    infra::{
        runtime::{reasoning_service, watch_config},
        terminal::TerminalAnswers,
    },
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "relic-server")]
#[command(about = "Photo-intake appraisal pipeline for vintage items")]
struct Cli {
    /// Path to a relic.toml (overrides RELIC_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone, Default)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (the default)
    Serve(ServeArgs),
    /// Appraise the given photos and print the result
    Analyze(AnalyzeArgs),
    /// Appraise each batch of photos dropped into a folder
    Watch(WatchArgs),
    /// Watch, appraise, list, relay and archive; poll for sales
    Auto(AutoArgs),
}

#[derive(ClapArgs, Debug)]
struct AnalyzeArgs {
    /// Photo files of a single item
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Triage with the fast model before the full appraisal
    #[arg(long)]
    two_stage: bool,

    /// Answer triage questions at the terminal (implies --two-stage)
    #[arg(long)]
    interactive: bool,

    /// Skip extended reasoning
    #[arg(long)]
    no_extended_thinking: bool,

    /// Target selling platform, repeatable
    #[arg(long = "platform")]
    platforms: Vec<String>,

    /// Save the item as a listing and post it to the marketplace
    /// (a draft is written when that is not possible)
    #[arg(long)]
    post: bool,
}

#[derive(ClapArgs, Debug)]
struct WatchArgs {
    /// Folder to watch (overrides WATCH_FOLDER)
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Triage with the fast model before the full appraisal
    #[arg(long)]
    two_stage: bool,
}

#[derive(ClapArgs, Debug)]
struct AutoArgs {
    /// Folder to watch (overrides WATCH_FOLDER)
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Keep every batch as a draft instead of listing it on the marketplace
    #[arg(long)]
    no_auto_post: bool,

    /// Do not poll the marketplace for sales
    #[arg(long)]
    no_notifications: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        None => run_server(config, cli.serve).await,
        Some(Command::Serve(args)) => run_server(config, args).await,
        Some(Command::Analyze(args)) => run_analyze(config, args).await,
        Some(Command::Watch(args)) => run_watch(config, args).await,
        Some(Command::Auto(args)) => run_auto(config, args).await,
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = path {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad { config, warnings } = loader.load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    Ok(config)
}

fn require_reasoning(config: &Config) -> anyhow::Result<Arc<dyn ReasoningService>> {
    reasoning_service(&config.reasoning)
        .context("failed to build reasoning client")?
        .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY not configured; set it in the environment or relic.toml"))
}

async fn require_folder(folder: Option<PathBuf>, config: &Config) -> anyhow::Result<PathBuf> {
    let Some(folder) = folder.or_else(|| config.watch.folder.clone()) else {
        bail!("watch folder not specified; set WATCH_FOLDER or pass --folder");
    };
    if !validate_folder(&folder).await {
        bail!("folder not found: {}", folder.display());
    }
    Ok(folder)
}

async fn run_server(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let runtime = Runtime::open(config).await.context("failed to open listing store")?;
    let pipeline = match runtime.reasoning_service().context("failed to build reasoning client")? {
        Some(service) => Some(runtime.pipeline(service, None)),
        None => {
            warn!("photo analysis disabled: reasoning service not configured");
            None
        }
    };
    let state = AppState::new(&runtime, pipeline);
    info!(
        uploads = %state.uploads_dir.display(),
        listings = %runtime.store.path().display(),
        "storage ready"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "relic server listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("server stopped");
    Ok(())
}

async fn run_analyze(config: Config, args: AnalyzeArgs) -> anyhow::Result<()> {
    let service = require_reasoning(&config)?;
    for image in &args.images {
        if !tokio::fs::metadata(image).await.is_ok_and(|meta| meta.is_file()) {
            bail!("not a file: {}", image.display());
        }
    }

    let answers: Option<Arc<dyn AnswerProvider>> = if args.interactive {
        Some(Arc::new(TerminalAnswers))
    } else {
        None
    };
    let options = AnalysisOptions {
        mode: if args.two_stage || args.interactive {
            AnalysisMode::TwoStage
        } else {
            AnalysisMode::SinglePass
        },
        extended_thinking: !args.no_extended_thinking,
        target_platforms: args.platforms,
    };

    if args.post {
        let runtime = Runtime::open(config).await.context("failed to open listing store")?;
        if runtime.relay.is_none() {
            warn!("marketplace credentials not configured; the item is saved as a draft");
        }
        let image_refs = args.images.iter().map(|path| path.display().to_string()).collect();
        let outcome = runtime
            .pipeline(service, answers)
            .process(&args.images, image_refs, &options, true)
            .await
            .context("intake failed")?;
        print_analysis(&outcome.listing.item.analysis);
        print_intake(&outcome);
        return Ok(());
    }

    let mut orchestrator = AnalysisOrchestrator::new(service);
    if let Some(answers) = answers {
        orchestrator = orchestrator.with_answer_provider(answers);
    }
    let analysis = orchestrator
        .analyze(&args.images, &options)
        .await
        .context("analysis failed")?;
    print_analysis(&analysis);
    Ok(())
}

async fn run_watch(config: Config, args: WatchArgs) -> anyhow::Result<()> {
    let service = require_reasoning(&config)?;
    let folder = require_folder(args.folder, &config).await?;
    let orchestrator = AnalysisOrchestrator::new(service);
    let options = AnalysisOptions {
        mode: if args.two_stage {
            AnalysisMode::TwoStage
        } else {
            AnalysisMode::SinglePass
        },
        ..AnalysisOptions::default()
    };

    let watcher = FolderWatcher::new(folder, watch_config(&config.watch));
    let mut events = watcher.subscribe();
    let mut batches = watcher.batches();
    watcher.start().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            batch = batches.recv() => {
                let Some(batch) = batch else { break };
                println!("\nProcessing {} new photo(s)...", batch.len());
                match orchestrator.analyze(&batch.paths, &options).await {
                    Ok(analysis) => print_summary(&analysis),
                    Err(err) => {
                        error!(kind = err.kind(), error = %err, "analysis failed");
                        println!("Analysis failed: {}", err.user_message());
                    }
                }
            }
            event = events.recv() => match event {
                Ok(WatchEvent::Started { folder }) => {
                    println!("Waiting for new photos in {}", folder.display());
                }
                Ok(WatchEvent::Error(message)) => warn!(error = %message, "watcher error"),
                Ok(WatchEvent::Stopped) | Err(RecvError::Closed) => break,
                // Batches arrive on their own channel.
                Ok(WatchEvent::Images(_)) | Err(RecvError::Lagged(_)) => {}
            },
        }
    }

    watcher.stop().await;
    Ok(())
}

async fn run_auto(config: Config, args: AutoArgs) -> anyhow::Result<()> {
    let service = require_reasoning(&config)?;
    let folder = require_folder(args.folder, &config).await?;

    let runtime = Runtime::open(config).await.context("failed to open listing store")?;
    let mut lifecycle = runtime.lifecycle_config();
    lifecycle.auto_relay = !args.no_auto_post;
    lifecycle.notify_on_sale &= !args.no_notifications;
    if lifecycle.auto_relay && runtime.relay.is_none() {
        warn!("marketplace credentials not configured; every batch is saved as a draft");
    }

    let watcher = Arc::new(FolderWatcher::new(folder, runtime.watch_config()));
    let lister = AutoLister::new(watcher, runtime.pipeline(service, None), lifecycle);
    lister.start().await;

    shutdown_signal().await;
    lister.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn print_intake(outcome: &IntakeOutcome) {
    println!("\nListing:   {}", outcome.listing.id);
    match &outcome.relay {
        RelayStatus::Relayed(relayed) => {
            println!("Posted:    {}", relayed.marketplace.url);
            println!("Fees:      ${:.2}", relayed.total_fees);
        }
        RelayStatus::Draft { draft, reason } => {
            if let Some(reason) = reason {
                println!("Not posted: {reason}");
            }
            if let Some(draft) = draft {
                println!("Draft:     {}", draft.display());
            }
        }
    }
}

fn print_summary(analysis: &ItemAnalysis) {
    println!("Title:     {}", analysis.title);
    println!("Price:     ${:.2}", analysis.suggested_price.recommended);
    println!("Condition: {}", analysis.condition);
}

fn print_analysis(analysis: &ItemAnalysis) {
    println!("\nANALYSIS RESULTS\n");
    println!("Title:     {}", analysis.title);
    println!("Era:       {}", analysis.era);
    println!("Condition: {}", analysis.condition);
    println!("Category:  {}", analysis.category);
    if let Some(brand) = &analysis.brand_or_maker {
        println!("Brand:     {brand}");
    }

    let price = &analysis.suggested_price;
    println!("\nSuggested price: ${:.2}", price.recommended);
    println!("  Range: ${:.2} - ${:.2}", price.low, price.high);
    if !price.reasoning.is_empty() {
        println!("  {}", price.reasoning);
    }

    if !analysis.keywords.is_empty() {
        println!("\nKeywords: {}", analysis.keywords.join(", "));
    }
    if !analysis.flaws.is_empty() {
        println!("\nFlaws:");
        for flaw in &analysis.flaws {
            println!("  - {flaw}");
        }
    }
    if let Some(reasoning) = &analysis.reasoning {
        let preview: String = reasoning.chars().take(300).collect();
        println!("\nReasoning summary:\n  {preview}...");
        println!("  [full reasoning: {} chars]", reasoning.chars().count());
    }
}
