use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, warn};

use absm_core::{domain::UserId, formatting::access_denied_text, security::is_authorized};

use crate::{handlers::commands::edit_screen, menu::Screen, router::AppState};

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let user_id = q.from.id.0 as i64;

    if !is_authorized(Some(UserId(user_id)), &state.cfg.allowed_user_ids) {
        warn!(user_id, "callback access denied");
        let _ = bot
            .answer_callback_query(q.id.clone())
            .text("Access denied")
            .await;
        if let Some(msg) = &q.message {
            let _ = bot.send_message(msg.chat.id, access_denied_text()).await;
        }
        return Ok(());
    }

    // Answer right away so the button stops spinning.
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let (Some(msg), Some(data)) = (q.message.as_ref(), q.data.as_deref()) else {
        return Ok(());
    };
    let Some(screen) = Screen::from_callback(data) else {
        debug!(data, "unknown callback data");
        return Ok(());
    };

    edit_screen(&bot, msg.chat.id, msg.id, screen, &state).await
}
