//! Formatting utilities and Telegram HTML views.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use serde_json::Value;

use crate::model::types::{Book, LibraryWithStats, ServerOverview, User};

/// Label used when a search hit points at a library we cannot resolve.
pub const UNKNOWN_LIBRARY: &str = "Unknown library";
/// Search hits rendered per reply.
pub const SEARCH_RESULT_LIMIT: usize = 10;
const TOP_ITEMS_LIMIT: usize = 5;
const RECENT_SESSIONS_LIMIT: usize = 3;
const ERROR_PREVIEW_CHARS: usize = 200;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Human-readable byte size (1024-based, two decimals above bytes).
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    let scaled = |unit: u64| bytes as f64 / unit as f64;
    match bytes {
        b if b >= TB => format!("{:.2} TB", scaled(TB)),
        b if b >= GB => format!("{:.2} GB", scaled(GB)),
        b if b >= MB => format!("{:.2} MB", scaled(MB)),
        b if b >= KB => format!("{:.2} KB", scaled(KB)),
        b => format!("{b} B"),
    }
}

/// `Nd Nh Nm Ns`, starting at the most significant non-zero unit.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    if days > 0 {
        return format!("{days}d {hours}h {mins}m {secs}s");
    }
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

fn seconds(v: f64) -> Duration {
    Duration::from_secs(if v.is_finite() && v > 0.0 { v as u64 } else { 0 })
}

/// Millisecond timestamp as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp_ms(ms: i64) -> String {
    format_ms_in(ms, &Local, "%Y-%m-%d %H:%M:%S")
}

fn format_ms_in<Tz>(ms: i64, tz: &Tz, pattern: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    DateTime::from_timestamp(ms / 1000, 0)
        .map(|utc| utc.with_timezone(tz).format(pattern).to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One-line error reply (`❌ prefix: reason`), truncated.
pub fn render_error(prefix: &str, err: &dyn std::fmt::Display) -> String {
    let msg = err.to_string();
    let msg = if msg.chars().count() > ERROR_PREVIEW_CHARS {
        format!("{}...", msg.chars().take(ERROR_PREVIEW_CHARS).collect::<String>())
    } else {
        msg
    };
    format!("❌ {}: {}", escape_html(prefix), escape_html(&msg))
}

// ============== Static views ==============

pub fn main_menu_text() -> String {
    "🎧 <b>Audiobookshelf Manager</b>\n\nChoose an action:".to_string()
}

pub fn help_text() -> String {
    [
        "🎧 <b>Audiobookshelf Manager help</b>",
        "",
        "Commands:",
        "• /start - show the main menu",
        "• /serverinfo - server information",
        "• /users - user list",
        "• /libraries - library list",
        "• /search - search books",
        "• /mystats - your listening stats",
        "• /help - this message",
        "",
        "Or use the buttons below.",
    ]
    .join("\n")
}

pub fn search_prompt_text() -> String {
    "🔍 Send the book title, author or any keyword to search for:".to_string()
}

pub fn access_denied_text() -> String {
    "🚫 Sorry, you are not allowed to use this bot.".to_string()
}

// ============== Data views ==============

pub fn render_server_overview(overview: &ServerOverview) -> String {
    let mut out = String::from("📊 <b>Audiobookshelf server</b>\n\n");
    out.push_str(&format!(
        "🖥 <b>Version</b>: <code>{}</code>\n",
        escape_html(&overview.status.server_version)
    ));
    out.push_str(&format!(
        "🔤 <b>Language</b>: <code>{}</code>\n",
        escape_html(&overview.status.language)
    ));

    out.push_str("\n📚 <b>Libraries</b>\n");
    match &overview.libraries {
        None => out.push_str("⚠️ Library information unavailable\n"),
        Some(libs) if libs.is_empty() => out.push_str("📭 No libraries yet\n"),
        Some(libs) => {
            out.push_str(&format!("📁 Total: <code>{}</code>\n", libs.len()));
            for lib in libs {
                out.push_str(&format!(
                    "📖 {} (📚 {})\n",
                    escape_html(&lib.library.name),
                    lib.item_count
                ));
            }
        }
    }
    out
}

pub fn render_libraries(libraries: &[LibraryWithStats]) -> String {
    if libraries.is_empty() {
        return "📭 No libraries found".to_string();
    }

    let mut out = String::from("📚 <b>Libraries</b>:\n\n");
    for lib in libraries {
        out.push_str(&format!(
            "📖 {} <i>({}, {} items)</i>\n",
            escape_html(&lib.library.name),
            escape_html(&lib.library.media_type),
            lib.item_count
        ));
    }
    out
}

fn render_user_card(user: &User) -> String {
    let role = if user.is_root() {
        "👑 Admin"
    } else {
        "👤 User"
    };
    let active = if user.is_active {
        "✅ Active"
    } else {
        "❌ Inactive"
    };
    let created = if user.created_at > 0 {
        format_timestamp_ms(user.created_at)
    } else {
        "unknown".to_string()
    };
    let last_seen = match user.last_seen {
        Some(ms) if ms > 0 => format_timestamp_ms(ms),
        _ => "never".to_string(),
    };

    format!(
        "👤 <b>{}</b>\n   {role} | {active}\n   📅 Created: {created}\n   👀 Last seen: {last_seen}\n   📊 Progress: {} items ({} finished)\n",
        escape_html(&user.username),
        user.media_progress.len(),
        user.finished_count(),
    )
}

pub fn render_users(users: &[User]) -> String {
    if users.is_empty() {
        return "📭 No users found".to_string();
    }

    let mut out = String::from("<b>👥 Users:</b>\n\n");
    for user in users {
        out.push_str(&render_user_card(user));
        out.push('\n');
    }
    out
}

/// Search hits, capped at [`SEARCH_RESULT_LIMIT`].
///
/// `library_label` maps a library id to its display name; callers resolve
/// unknown ids to [`UNKNOWN_LIBRARY`].
pub fn render_search_results(
    term: &str,
    books: &[Book],
    library_label: impl Fn(&str) -> String,
) -> String {
    let mut out = format!("🔎 Results for \"{}\":\n\n", escape_html(term));
    if books.is_empty() {
        out.push_str("No matching books.\n");
        return out;
    }

    out.push_str("<b>📚 Books found:</b>\n");
    for book in books.iter().take(SEARCH_RESULT_LIMIT) {
        out.push_str(&format!(
            "• <b>{}</b>\n  📁 Library: {}\n  💾 Size: {}\n  ⏳ Added: {}\n\n",
            escape_html(&book.rel_path),
            escape_html(&library_label(&book.library_id)),
            format_bytes(book.size),
            format_timestamp_ms(book.added_at),
        ));
    }
    if books.len() > SEARCH_RESULT_LIMIT {
        out.push_str(&format!(
            "+ {} more books...",
            books.len() - SEARCH_RESULT_LIMIT
        ));
    }
    out
}

// ============== Listening stats ==============

#[derive(Clone, Debug, PartialEq)]
pub struct PlayedItem {
    pub title: String,
    pub author: Option<String>,
    pub time_listening: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecentSession {
    pub title: String,
    pub display_title: Option<String>,
    pub time_listening: f64,
    pub updated_at: Option<i64>,
}

/// The parts of `/api/me/listening-stats` the bot shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListeningSummary {
    pub total_time: f64,
    /// Longest-listened first, capped.
    pub top_items: Vec<PlayedItem>,
    /// Most recent first, capped.
    pub recent_sessions: Vec<RecentSession>,
}

fn metadata_title(v: &Value) -> Option<String> {
    v.get("mediaMetadata")?
        .get("title")?
        .as_str()
        .map(str::to_string)
}

pub fn summarize_listening_stats(stats: &Value) -> ListeningSummary {
    let total_time = stats.get("totalTime").and_then(Value::as_f64).unwrap_or(0.0);

    let mut top_items: Vec<PlayedItem> = stats
        .get("items")
        .and_then(Value::as_object)
        .map(|items| {
            items
                .values()
                .filter(|v| v.is_object())
                .map(|item| PlayedItem {
                    title: metadata_title(item).unwrap_or_else(|| "Unknown book".to_string()),
                    author: item
                        .get("mediaMetadata")
                        .and_then(|m| m.get("author"))
                        .and_then(Value::as_str)
                        .filter(|a| !a.is_empty())
                        .map(str::to_string),
                    time_listening: item
                        .get("timeListening")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0),
                })
                .collect()
        })
        .unwrap_or_default();
    top_items.sort_by(|a, b| b.time_listening.total_cmp(&a.time_listening));
    top_items.truncate(TOP_ITEMS_LIMIT);

    let recent_sessions = stats
        .get("recentSessions")
        .and_then(Value::as_array)
        .map(|sessions| {
            sessions
                .iter()
                .filter(|v| v.is_object())
                .take(RECENT_SESSIONS_LIMIT)
                .map(|s| RecentSession {
                    title: metadata_title(s).unwrap_or_else(|| "Unknown book".to_string()),
                    display_title: s
                        .get("displayTitle")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                    time_listening: s
                        .get("timeListening")
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0),
                    updated_at: s
                        .get("updatedAt")
                        .and_then(Value::as_f64)
                        .map(|ms| ms as i64),
                })
                .collect()
        })
        .unwrap_or_default();

    ListeningSummary {
        total_time,
        top_items,
        recent_sessions,
    }
}

pub fn render_my_stats(user: &User, stats: &Value) -> String {
    let summary = summarize_listening_stats(stats);

    let mut out = String::from("<b>📈 My stats:</b>\n\n");
    out.push_str(&render_user_card(user));
    out.push_str("\n🎧 <b>Listening:</b>\n");
    out.push_str(&format!(
        "   ⏱ Total time: {}\n",
        format_duration(seconds(summary.total_time))
    ));

    if !summary.top_items.is_empty() {
        out.push_str("\n📚 <b>Most listened:</b>\n");
        for item in &summary.top_items {
            let time = format_duration(seconds(item.time_listening));
            match &item.author {
                Some(author) => out.push_str(&format!(
                    "• {}\n  {time} | by {}\n",
                    escape_html(&item.title),
                    escape_html(author)
                )),
                None => out.push_str(&format!("• {}\n  {time}\n", escape_html(&item.title))),
            }
        }
    }

    if !summary.recent_sessions.is_empty() {
        out.push_str("\n🕒 <b>Recent sessions:</b>\n");
        for s in &summary.recent_sessions {
            let chapter = s
                .display_title
                .as_deref()
                .map(|t| format!(" ({})", escape_html(t)))
                .unwrap_or_default();
            let when = s
                .updated_at
                .map(|ms| format_ms_in(ms, &Local, "%m-%d %H:%M"))
                .unwrap_or_default();
            out.push_str(&format!(
                "• {}{chapter}\n  {} | {when}\n",
                escape_html(&s.title),
                format_duration(seconds(s.time_listening)),
            ));
        }
    }

    out
}
