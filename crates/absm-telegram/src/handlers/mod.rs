//! Telegram update handlers.
//!
//! Each handler:
//! - checks the allow-list (empty list admits everyone)
//! - maps the update onto a [`Screen`](crate::menu::Screen) or a search
//! - renders the aggregation result as HTML

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::{debug, info, warn};

use absm_core::{domain::UserId, formatting::access_denied_text, security::is_authorized};

use crate::{menu::Screen, router::AppState};

mod callback;
mod commands;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let username = user
        .username
        .clone()
        .unwrap_or_else(|| "unknown".to_string());

    if !is_authorized(Some(UserId(user_id)), &state.cfg.allowed_user_ids) {
        warn!(user = %username, user_id, "access denied");
        let _ = bot.send_message(msg.chat.id, access_denied_text()).await;
        return Ok(());
    }

    // Private chats only.
    if !msg.chat.is_private() {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    info!(user = %username, text, "message");

    if text.starts_with('/') {
        let (cmd, args) = commands::parse_command(text);
        return match Screen::from_command(&cmd) {
            Some(Screen::SearchPrompt) if !args.is_empty() => {
                commands::send_search_results(&bot, msg.chat.id, &args, &state).await
            }
            Some(screen) => commands::send_screen(&bot, msg.chat.id, screen, &state).await,
            None => {
                debug!(cmd, "unknown command");
                commands::send_screen(&bot, msg.chat.id, Screen::Help, &state).await
            }
        };
    }

    // Any other text is a search term.
    commands::send_search_results(&bot, msg.chat.id, text, &state).await
}
