//! Server-data aggregation.
//!
//! Composes per-item upstream calls into the views the bot renders:
//! - libraries with item counts (bounded fan-out + short-lived cache)
//! - users with their media progress (bounded fan-out, never cached)
//! - search, current user, listening stats (thin wrappers with error context)

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    sync::{RwLock, Semaphore},
    task::JoinSet,
    time::Instant,
};
use tracing::{debug, warn};

use crate::{
    config::DEFAULT_CACHE_EXPIRY,
    errors::Error,
    model::{
        client::MediaServerApi,
        types::{Book, LibraryWithStats, ServerOverview, User},
    },
    Result,
};

/// Upper bound on simultaneous upstream calls during a fan-out.
pub const MAX_CONCURRENCY: usize = 4;

/// Result of one fan-out sub-request.
#[derive(Debug)]
pub enum Outcome<T> {
    Fetched(T),
    Degraded(Error),
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(res: Result<T>) -> Self {
        match res {
            Ok(v) => Outcome::Fetched(v),
            Err(e) => Outcome::Degraded(e),
        }
    }
}

struct CachedLibraries {
    value: Vec<LibraryWithStats>,
    fetched_at: Instant,
}

/// Aggregation service over a [`MediaServerApi`].
///
/// One instance owns its cache; share it behind an `Arc`.
pub struct ServerService {
    api: Arc<dyn MediaServerApi>,
    cache_expiry: Duration,
    libraries_cache: RwLock<Option<CachedLibraries>>,
}

impl ServerService {
    pub fn new(api: Arc<dyn MediaServerApi>) -> Self {
        Self {
            api,
            cache_expiry: DEFAULT_CACHE_EXPIRY,
            libraries_cache: RwLock::new(None),
        }
    }

    pub fn with_cache_expiry(mut self, expiry: Duration) -> Self {
        self.cache_expiry = expiry;
        self
    }

    /// Server status plus the library overview.
    ///
    /// A library failure does not fail the overview; it is reported as
    /// unavailable.
    pub async fn server_overview(&self) -> Result<ServerOverview> {
        let status = self
            .api
            .server_status()
            .await
            .map_err(|e| e.context("failed to fetch server status"))?;

        let libraries = match self.libraries_with_stats().await {
            Ok(libs) => Some(libs),
            Err(e) => {
                warn!(error = %e, "library overview unavailable");
                None
            }
        };

        Ok(ServerOverview { status, libraries })
    }

    /// Libraries in upstream order, each with its item count.
    ///
    /// Served from cache while younger than the expiry. Otherwise the list is
    /// refetched and counts are fetched concurrently; a failed count reports
    /// 0. Only a failed library listing is an error, and it leaves the cache
    /// untouched. Concurrent callers past an expired entry each refresh.
    pub async fn libraries_with_stats(&self) -> Result<Vec<LibraryWithStats>> {
        {
            let cache = self.libraries_cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.fetched_at.elapsed() < self.cache_expiry {
                    return Ok(entry.value.clone());
                }
            }
        }

        let libraries = self.api.libraries().await?;
        debug!(count = libraries.len(), "refreshing library stats");

        let ids: Vec<String> = libraries.iter().map(|l| l.id.clone()).collect();
        let api = self.api.clone();
        let counts = fan_out(ids, MAX_CONCURRENCY, move |id: String| {
            let api = api.clone();
            async move { api.library_item_count(&id).await }
        })
        .await;

        let stats: Vec<LibraryWithStats> = libraries
            .into_iter()
            .zip(counts)
            .map(|(library, outcome)| {
                let item_count = match outcome {
                    Outcome::Fetched(n) => n,
                    Outcome::Degraded(e) => {
                        warn!(library = %library.name, error = %e, "item count unavailable, using 0");
                        0
                    }
                };
                LibraryWithStats {
                    library,
                    item_count,
                }
            })
            .collect();

        *self.libraries_cache.write().await = Some(CachedLibraries {
            value: stats.clone(),
            fetched_at: Instant::now(),
        });

        Ok(stats)
    }

    /// Name of the library with `library_id`, from a fresh listing.
    pub async fn library_name(&self, library_id: &str) -> Result<String> {
        self.library_names()
            .await?
            .remove(library_id)
            .ok_or_else(|| Error::NotFound(format!("library with id {library_id}")))
    }

    /// Id to name for every library, from one fresh listing.
    pub async fn library_names(&self) -> Result<HashMap<String, String>> {
        let libraries = self.api.libraries().await?;
        Ok(libraries.into_iter().map(|l| (l.id, l.name)).collect())
    }

    /// All users, each with media progress attached when it could be fetched.
    pub async fn users_with_progress(&self) -> Result<Vec<User>> {
        let mut users = self
            .api
            .users()
            .await
            .map_err(|e| e.context("failed to fetch user list"))?;

        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();
        let api = self.api.clone();
        let progress = fan_out(ids, MAX_CONCURRENCY, move |id: String| {
            let api = api.clone();
            async move { api.user_media_progress(&id).await }
        })
        .await;

        for (user, outcome) in users.iter_mut().zip(progress) {
            match outcome {
                Outcome::Fetched(p) => user.media_progress = p,
                Outcome::Degraded(e) => {
                    warn!(user = %user.username, error = %e, "failed to fetch media progress");
                }
            }
        }

        Ok(users)
    }

    pub async fn search_books(&self, term: &str, library_id: Option<&str>) -> Result<Vec<Book>> {
        if term.trim().is_empty() {
            return Err(Error::InvalidInput("search term must not be empty".to_string()));
        }

        self.api
            .search_books(term, library_id)
            .await
            .map_err(|e| e.context("search failed"))
    }

    /// The token's own user record; progress is best-effort.
    pub async fn current_user_with_progress(&self) -> Result<User> {
        let mut user = self
            .api
            .current_user()
            .await
            .map_err(|e| e.context("failed to fetch current user"))?;

        match self.api.user_media_progress(&user.id).await {
            Ok(p) => user.media_progress = p,
            Err(e) => {
                warn!(user = %user.username, error = %e, "failed to fetch media progress");
            }
        }

        Ok(user)
    }

    pub async fn listening_stats(&self) -> Result<serde_json::Value> {
        self.api
            .listening_stats()
            .await
            .map_err(|e| e.context("failed to fetch listening stats"))
    }
}

/// Run `fetch` for every item with at most `limit` calls in flight.
///
/// Returns one outcome per item, in input order. Every spawned task is joined
/// before returning.
pub async fn fan_out<I, T, F, Fut>(items: Vec<I>, limit: usize, fetch: F) -> Vec<Outcome<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let len = items.len();
    let slots: Arc<Mutex<Vec<Option<Outcome<T>>>>> =
        Arc::new(Mutex::new((0..len).map(|_| None).collect()));
    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let fetch = Arc::new(fetch);

    let mut tasks = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let slots = slots.clone();
        let permits = permits.clone();
        let fetch = fetch.clone();
        tasks.spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => Outcome::from(fetch(item).await),
                Err(e) => Outcome::Degraded(Error::External(format!("fan-out closed: {e}"))),
            };
            // Held for the assignment only.
            let mut guard = slots.lock().unwrap_or_else(|p| p.into_inner());
            guard[index] = Some(outcome);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "fan-out task aborted");
        }
    }

    let filled = std::mem::take(&mut *slots.lock().unwrap_or_else(|p| p.into_inner()));
    filled
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Outcome::Degraded(Error::External("fan-out task did not finish".to_string()))
            })
        })
        .collect()
}
