use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::ChatController;
use parley_core::models::ErrorStore;
use parley_core::render::syntax_highlighter::{DEFAULT_THEME, is_known_theme};
use parley_core::repositories::ConversationJsonRepository;
use parley_core::services::{
    EchoGenerator, ErrorCollectorLayer, MessageGenerator, OpenAiConfig, OpenAiGenerator,
};
use parley_core::settings::{Settings, SettingsJsonRepository, SettingsRepository};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod repl;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal chat client for OpenAI-compatible servers", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/parley/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// API root, e.g. http://localhost:11434/v1
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    model: Option<String>,

    /// Directory holding chats.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Answer with a local echo instead of calling a server
    #[arg(long)]
    offline: bool,
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            settings.data_dir = Some(data_dir.clone());
        }
    }
}

fn init_logging(errors: ErrorStore) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(ErrorCollectorLayer::new(errors))
        .init();
}

async fn load_settings(cli: &Cli) -> Result<Settings> {
    let repository = match &cli.config {
        Some(path) => SettingsJsonRepository::with_path(path.clone()),
        None => SettingsJsonRepository::new()?,
    };

    let mut settings = repository
        .load()
        .await
        .with_context(|| format!("failed to load {}", repository.file_path().display()))?;

    // First run: write the defaults out so they can be edited
    if !repository.file_path().exists() {
        if let Err(e) = repository.save(settings.clone()).await {
            warn!(error = ?e, "Could not write default settings");
        }
    }

    cli.apply_overrides(&mut settings);
    if !is_known_theme(&settings.highlight_theme) {
        warn!(theme = %settings.highlight_theme, fallback = DEFAULT_THEME, "Unknown highlight theme");
    }
    Ok(settings)
}

fn build_generator(cli: &Cli, settings: &Settings) -> Arc<dyn MessageGenerator> {
    if cli.offline {
        info!("Offline mode, using echo generator");
        return Arc::new(EchoGenerator::default());
    }

    let api_key = settings.api_key();
    if api_key.is_none() {
        warn!(variable = %settings.api_key_env, "No API key set, sending unauthenticated requests");
    }
    Arc::new(OpenAiGenerator::new(OpenAiConfig {
        base_url: settings.base_url.clone(),
        model: settings.model.clone(),
        api_key,
        system_prompt: settings.system_prompt.clone(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let errors = ErrorStore::default();
    init_logging(errors.clone());

    let settings = load_settings(&cli).await?;
    let data_dir = settings
        .conversations_dir()
        .context("cannot determine a data directory; pass --data-dir")?;
    info!(data_dir = %data_dir.display(), model = %settings.model, "Starting parley");

    let repository = Arc::new(ConversationJsonRepository::with_dir(data_dir));
    let generator = build_generator(&cli, &settings);
    let controller = ChatController::load(repository, generator, settings.flush_interval()).await;

    repl::run(controller, errors, settings.highlight_theme).await
}
