use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// A bot screen, reachable by command or inline button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    Help,
    ServerInfo,
    Libraries,
    Users,
    SearchPrompt,
    MyStats,
}

impl Screen {
    pub fn from_command(cmd: &str) -> Option<Self> {
        match cmd {
            "start" => Some(Screen::MainMenu),
            "help" => Some(Screen::Help),
            "serverinfo" => Some(Screen::ServerInfo),
            "libraries" => Some(Screen::Libraries),
            "users" => Some(Screen::Users),
            "search" => Some(Screen::SearchPrompt),
            "mystats" => Some(Screen::MyStats),
            _ => None,
        }
    }

    pub fn from_callback(data: &str) -> Option<Self> {
        match data {
            "main_menu" => Some(Screen::MainMenu),
            "help" => Some(Screen::Help),
            "system_info" => Some(Screen::ServerInfo),
            "libraries_list" => Some(Screen::Libraries),
            "users_list" => Some(Screen::Users),
            "search_books" => Some(Screen::SearchPrompt),
            "my_stats" => Some(Screen::MyStats),
            _ => None,
        }
    }

    pub fn callback_data(self) -> &'static str {
        match self {
            Screen::MainMenu => "main_menu",
            Screen::Help => "help",
            Screen::ServerInfo => "system_info",
            Screen::Libraries => "libraries_list",
            Screen::Users => "users_list",
            Screen::SearchPrompt => "search_books",
            Screen::MyStats => "my_stats",
        }
    }

    /// Placeholder shown while a data screen is being fetched.
    pub fn loading_text(self) -> Option<&'static str> {
        match self {
            Screen::ServerInfo => Some("📊 Fetching server information, please wait..."),
            Screen::Libraries => Some("📚 Fetching libraries, please wait..."),
            Screen::Users => Some("👥 Fetching users, please wait..."),
            Screen::MyStats => Some("📈 Fetching your stats, please wait..."),
            Screen::MainMenu | Screen::Help | Screen::SearchPrompt => None,
        }
    }

    pub fn keyboard(self) -> InlineKeyboardMarkup {
        match self {
            Screen::MainMenu | Screen::Help => main_menu(),
            Screen::SearchPrompt => back_only(),
            data => refresh_and_back(data),
        }
    }
}

fn button(label: &str, screen: Screen) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, screen.callback_data())
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("📊 Server info", Screen::ServerInfo),
            button("📚 Libraries", Screen::Libraries),
        ],
        vec![
            button("👥 Users", Screen::Users),
            button("🔍 Search", Screen::SearchPrompt),
        ],
        vec![
            button("📈 My stats", Screen::MyStats),
            button("❓ Help", Screen::Help),
        ],
    ])
}

fn back_only() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("⬅️ Main menu", Screen::MainMenu)]])
}

fn refresh_and_back(screen: Screen) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("🔄 Refresh", screen),
        button("⬅️ Main menu", Screen::MainMenu),
    ]])
}
