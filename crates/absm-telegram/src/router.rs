use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};
use tracing::{info, warn};

use absm_core::{config::Config, service::ServerService};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub service: Arc<ServerService>,
}

/// Build the Telegram client, routed through `PROXY_ADDRESS` when set.
///
/// The proxy applies to Telegram traffic only; the Audiobookshelf client
/// connects directly.
pub fn build_bot(cfg: &Config) -> anyhow::Result<Bot> {
    let Some(proxy) = cfg.proxy_address.as_deref() else {
        return Ok(Bot::new(cfg.telegram_bot_token.clone()));
    };

    let url = proxy_url(proxy);
    info!(proxy = %url, "connecting to Telegram through proxy");
    let client = teloxide::net::default_reqwest_settings()
        .proxy(reqwest::Proxy::all(&url).with_context(|| format!("invalid proxy address {proxy}"))?)
        .build()
        .context("failed to build proxied Telegram client")?;

    Ok(Bot::with_client(cfg.telegram_bot_token.clone(), client))
}

fn proxy_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

pub fn bot_commands() -> Vec<BotCommand> {
    [
        ("start", "Show the main menu"),
        ("serverinfo", "Server information"),
        ("libraries", "List libraries"),
        ("users", "List users"),
        ("search", "Search books"),
        ("mystats", "My listening stats"),
        ("help", "Help"),
    ]
    .into_iter()
    .map(|(cmd, desc)| BotCommand::new(cmd, desc))
    .collect()
}

pub async fn run_polling(cfg: Arc<Config>, service: Arc<ServerService>) -> anyhow::Result<()> {
    let bot = build_bot(&cfg)?;

    let me = bot
        .get_me()
        .await
        .context("cannot reach the Telegram Bot API")?;
    info!(username = %me.username(), "bot authorized");

    if cfg.allowed_user_ids.is_empty() {
        info!("no ALLOWED_USER_IDS configured, every user is allowed");
    } else {
        info!(allowed = ?cfg.allowed_user_ids, "allow-list active");
    }

    match bot.set_my_commands(bot_commands()).await {
        Ok(_) => info!("registered bot commands"),
        Err(e) => warn!(error = %e, "failed to register bot commands"),
    }

    let state = Arc::new(AppState { cfg, service });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("dispatcher stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_address_defaults_to_http_scheme() {
        assert_eq!(proxy_url("127.0.0.1:7890"), "http://127.0.0.1:7890");
        assert_eq!(proxy_url("socks5://127.0.0.1:1080"), "socks5://127.0.0.1:1080");
    }

    #[test]
    fn proxied_bot_builds_without_network() {
        let cfg = Config::from_lookup(|k| match k {
            "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
            "PROXY_ADDRESS" => Some("127.0.0.1:7890".to_string()),
            _ => None,
        })
        .unwrap();
        assert!(build_bot(&cfg).is_ok());
    }

    #[test]
    fn registers_every_menu_command() {
        let names: Vec<_> = bot_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(
            names,
            vec!["start", "serverinfo", "libraries", "users", "search", "mystats", "help"]
        );
    }
}
