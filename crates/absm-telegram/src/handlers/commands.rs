use std::collections::HashMap;

use teloxide::{
    prelude::*,
    types::{MessageId, ParseMode},
};
use tracing::{debug, warn};

use absm_core::{
    formatting::{
        help_text, main_menu_text, render_error, render_libraries, render_my_stats,
        render_search_results, render_server_overview, render_users, search_prompt_text,
        SEARCH_RESULT_LIMIT, UNKNOWN_LIBRARY,
    },
    model::types::Book,
    service::ServerService,
};

use crate::{menu::Screen, router::AppState};

pub(crate) fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Render a screen by calling the matching aggregation.
pub(crate) async fn render_screen(screen: Screen, service: &ServerService) -> String {
    match screen {
        Screen::MainMenu => main_menu_text(),
        Screen::Help => help_text(),
        Screen::SearchPrompt => search_prompt_text(),
        Screen::ServerInfo => match service.server_overview().await {
            Ok(overview) => render_server_overview(&overview),
            Err(e) => render_error("Failed to fetch server info", &e),
        },
        Screen::Libraries => match service.libraries_with_stats().await {
            Ok(libs) => render_libraries(&libs),
            Err(e) => render_error("Failed to fetch libraries", &e),
        },
        Screen::Users => match service.users_with_progress().await {
            Ok(users) => render_users(&users),
            Err(e) => render_error("Failed to fetch users", &e),
        },
        Screen::MyStats => {
            let user = match service.current_user_with_progress().await {
                Ok(u) => u,
                Err(e) => return render_error("Failed to fetch your account", &e),
            };
            match service.listening_stats().await {
                Ok(stats) => render_my_stats(&user, &stats),
                Err(e) => render_error("Failed to fetch listening stats", &e),
            }
        }
    }
}

pub(crate) async fn send_screen(
    bot: &Bot,
    chat_id: ChatId,
    screen: Screen,
    state: &AppState,
) -> ResponseResult<()> {
    let html = render_screen(screen, &state.service).await;
    if let Err(e) = bot
        .send_message(chat_id, html)
        .parse_mode(ParseMode::Html)
        .reply_markup(screen.keyboard())
        .await
    {
        warn!(?screen, error = %e, "failed to send screen");
    }
    Ok(())
}

pub(crate) async fn edit_screen(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    screen: Screen,
    state: &AppState,
) -> ResponseResult<()> {
    if let Some(loading) = screen.loading_text() {
        let _ = bot.edit_message_text(chat_id, message_id, loading).await;
    }

    let html = render_screen(screen, &state.service).await;
    if let Err(e) = bot
        .edit_message_text(chat_id, message_id, html)
        .parse_mode(ParseMode::Html)
        .reply_markup(screen.keyboard())
        .await
    {
        // Refreshing an unchanged (cached) view is rejected as "not modified".
        debug!(?screen, error = %e, "failed to edit screen");
    }
    Ok(())
}

/// Distinct library ids among the hits that will be displayed.
fn displayed_library_ids(books: &[Book]) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for book in books.iter().take(SEARCH_RESULT_LIMIT) {
        if !ids.contains(&book.library_id.as_str()) {
            ids.push(&book.library_id);
        }
    }
    ids
}

async fn library_labels(service: &ServerService, books: &[Book]) -> HashMap<String, String> {
    let ids = displayed_library_ids(books);
    if ids.is_empty() {
        return HashMap::new();
    }

    let names = match service.library_names().await {
        Ok(names) => names,
        Err(e) => {
            debug!(error = %e, "library labels unavailable");
            HashMap::new()
        }
    };
    resolve_labels(&ids, &names)
}

fn resolve_labels(ids: &[&str], names: &HashMap<String, String>) -> HashMap<String, String> {
    ids.iter()
        .map(|id| {
            let label = names
                .get(*id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_LIBRARY.to_string());
            (id.to_string(), label)
        })
        .collect()
}

pub(crate) async fn send_search_results(
    bot: &Bot,
    chat_id: ChatId,
    term: &str,
    state: &AppState,
) -> ResponseResult<()> {
    let html = match state.service.search_books(term, None).await {
        Ok(books) => {
            let labels = library_labels(&state.service, &books).await;
            render_search_results(term, &books, |id| {
                labels
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_LIBRARY.to_string())
            })
        }
        Err(e) => {
            warn!(term, error = %e, "search failed");
            render_error("Search failed", &e)
        }
    };

    if let Err(e) = bot
        .send_message(chat_id, html)
        .parse_mode(ParseMode::Html)
        .reply_markup(Screen::MainMenu.keyboard())
        .await
    {
        warn!(error = %e, "failed to send search results");
    }
    Ok(())
}
