use async_trait::async_trait;

use crate::Result;

use super::types::*;

/// Hexagonal port for the Audiobookshelf REST API.
///
/// Implementations perform exactly one logical upstream call per method (the
/// unscoped search being the exception: it fans out over every library) and
/// never retry. Errors name the failing operation.
#[async_trait]
pub trait MediaServerApi: Send + Sync {
    async fn server_status(&self) -> Result<ServerStatus>;

    async fn libraries(&self) -> Result<Vec<Library>>;

    async fn library_item_count(&self, library_id: &str) -> Result<u64>;

    async fn users(&self) -> Result<Vec<User>>;

    async fn current_user(&self) -> Result<User>;

    async fn user_media_progress(&self, user_id: &str) -> Result<Vec<MediaProgress>>;

    /// Free-text search, optionally scoped to one library.
    async fn search_books(&self, term: &str, library_id: Option<&str>) -> Result<Vec<Book>>;

    /// Listening statistics for the token's user, as returned by the server.
    async fn listening_stats(&self) -> Result<serde_json::Value>;
}
