use std::sync::Arc;

use tracing::{info, warn};

use absm_api::AbsClient;
use absm_core::{config::Config, model::client::MediaServerApi, service::ServerService};

#[tokio::main]
async fn main() -> Result<(), absm_core::Error> {
    let cfg = Arc::new(Config::load()?);
    absm_core::logging::init("absm", cfg.debug)?;

    if cfg.abs_token.is_empty() {
        warn!("AUDIOBOOKSHELF_TOKEN is not set; upstream requests will be unauthenticated");
    }

    let client = AbsClient::from_config(&cfg)?;
    info!(base_url = client.base_url(), "audiobookshelf client ready");

    let api: Arc<dyn MediaServerApi> = Arc::new(client);

    // Startup probe; the bot still runs if the server is down.
    match api.libraries().await {
        Ok(libs) => info!(libraries = libs.len(), "audiobookshelf reachable"),
        Err(e) => warn!(error = %e, "audiobookshelf connectivity check failed"),
    }

    let service = Arc::new(ServerService::new(api).with_cache_expiry(cfg.cache_expiry));

    absm_telegram::router::run_polling(cfg, service)
        .await
        .map_err(|e| absm_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
