use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cardscout_common::AppConfig;
use cardscout_updater::extractor::Extractor;
use cardscout_updater::fetcher::HttpFetcher;
use cardscout_updater::run_log::RunLog;
use cardscout_updater::sources;
use cardscout_updater::store::CheckpointStore;
use cardscout_updater::updater::CardUpdater;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Cardscout updater starting...");

    let config = AppConfig::from_env();
    config.log_redacted();

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuration error: {e}");
        }
        anyhow::bail!("Refusing to start with {} configuration error(s)", errors.len());
    }

    let catalog = sources::load_catalog(&config.sources_path())?;
    info!(cards = catalog.len(), "Loaded source catalog");

    // A dead local server is not fatal: every card degrades to its
    // existing data and gets retried next run.
    if let Err(e) = llm_client::probe_local(config.provider, &config.base_url).await {
        warn!(error = %e, "Local LLM not reachable; extraction will fall back to existing data");
    }

    let client = llm_client::build_client(config.provider, &config.model, &config.base_url);
    let extractor = Extractor::new(client, config.api_keys.clone(), config.provider.is_cloud());
    let fetcher = HttpFetcher::new(config.scrape_timeout, &config.user_agent)?;
    let store = CheckpointStore::new(config.cards_path());

    let updater = CardUpdater::new(Box::new(fetcher), extractor, store, config.scrape_delay);
    let stats = updater.run(&catalog).await?;

    RunLog::new(config.run_log_path()).append(config.provider.as_str(), &config.model, &stats)?;

    info!("{stats}");
    Ok(())
}
