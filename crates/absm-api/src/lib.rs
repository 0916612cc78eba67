//! Audiobookshelf adapter.
//!
//! Implements the `absm-core` `MediaServerApi` port over the Audiobookshelf
//! REST API with bearer-token auth. No retries: every failure is returned to
//! the caller tagged with the operation that produced it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use absm_core::{
    config::Config,
    errors::Error,
    model::{
        client::MediaServerApi,
        types::{Book, Library, MediaProgress, ServerStatus, User},
    },
    service::{fan_out, Outcome, MAX_CONCURRENCY},
    Result,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:13378";
const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Clone, Debug)]
pub struct AbsClient {
    base_url: Url,
    token: String,
    http: reqwest::Client,
}

impl AbsClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("absm/0.1")
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;

        Ok(Self {
            base_url: parse_base_url(base_url)?,
            token: token.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.abs_base_url, cfg.abs_token.clone(), cfg.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Base URL extended by `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        op: &'static str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(op, %url, "upstream request");

        let mut req = self.http.get(url).query(query);
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }

        let resp = req.send().await.map_err(|e| Error::Transport {
            op,
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                op,
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| Error::Transport {
            op,
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode {
            op,
            reason: e.to_string(),
        })
    }

    async fn search_library(&self, term: &str, library_id: &str) -> Result<Vec<Book>> {
        let page: SearchResponse = self
            .get_json(
                "search library",
                &["api", "libraries", library_id, "search"],
                &[("q", term)],
            )
            .await?;
        Ok(page.into_books())
    }
}

#[derive(Deserialize)]
struct LibrariesResponse {
    #[serde(default)]
    libraries: Vec<Library>,
}

#[derive(Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Deserialize)]
struct ItemsPage {
    total: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProgressResponse {
    #[serde(default)]
    media_progress: Vec<MediaProgress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    library_item: Book,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    book: Vec<SearchHit>,
    podcast: Vec<SearchHit>,
}

impl SearchResponse {
    fn into_books(self) -> Vec<Book> {
        self.book
            .into_iter()
            .chain(self.podcast)
            .map(|hit| hit.library_item)
            .collect()
    }
}

#[async_trait]
impl MediaServerApi for AbsClient {
    async fn server_status(&self) -> Result<ServerStatus> {
        self.get_json("fetch server status", &["status"], &[]).await
    }

    async fn libraries(&self) -> Result<Vec<Library>> {
        let resp: LibrariesResponse = self
            .get_json("list libraries", &["api", "libraries"], &[])
            .await?;
        Ok(resp.libraries)
    }

    async fn library_item_count(&self, library_id: &str) -> Result<u64> {
        let page: ItemsPage = self
            .get_json(
                "count library items",
                &["api", "libraries", library_id, "items"],
                &[("limit", "1"), ("minified", "1")],
            )
            .await?;
        Ok(page.total)
    }

    async fn users(&self) -> Result<Vec<User>> {
        let resp: UsersResponse = self.get_json("list users", &["api", "users"], &[]).await?;
        Ok(resp.users)
    }

    async fn current_user(&self) -> Result<User> {
        self.get_json("fetch current user", &["api", "me"], &[]).await
    }

    async fn user_media_progress(&self, user_id: &str) -> Result<Vec<MediaProgress>> {
        let resp: UserProgressResponse = self
            .get_json(
                "fetch user progress",
                &["api", "users", user_id],
                &[],
            )
            .await?;
        Ok(resp.media_progress)
    }

    async fn search_books(&self, term: &str, library_id: Option<&str>) -> Result<Vec<Book>> {
        if let Some(id) = library_id.filter(|id| !id.is_empty()) {
            return self.search_library(term, id).await;
        }

        // Unscoped: every library, merged in listing order.
        let ids: Vec<String> = self.libraries().await?.into_iter().map(|l| l.id).collect();
        let client = self.clone();
        let term = term.to_string();
        let hits = fan_out(ids, MAX_CONCURRENCY, move |id: String| {
            let client = client.clone();
            let term = term.clone();
            async move { client.search_library(&term, &id).await }
        })
        .await;

        let mut out = Vec::new();
        for outcome in hits {
            match outcome {
                Outcome::Fetched(books) => out.extend(books),
                Outcome::Degraded(e) => return Err(e),
            }
        }
        Ok(out)
    }

    async fn listening_stats(&self) -> Result<serde_json::Value> {
        self.get_json(
            "fetch listening stats",
            &["api", "me", "listening-stats"],
            &[],
        )
        .await
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let raw = if trimmed.is_empty() { DEFAULT_BASE_URL } else { trimmed };

    let url = Url::parse(raw)
        .map_err(|e| Error::Config(format!("invalid Audiobookshelf URL {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("invalid Audiobookshelf URL {raw:?}")));
    }
    Ok(url)
}

fn preview(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > BODY_PREVIEW_CHARS {
        format!("{}...", body.chars().take(BODY_PREVIEW_CHARS).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    fn client(url: &str) -> AbsClient {
        AbsClient::new(url, "test_token", Duration::from_secs(2)).unwrap()
    }

    /// Request path -> (status line, body).
    type Route = fn(&str) -> (&'static str, String);

    /// Local HTTP/1.1 server answering every connection once via `route`.
    /// Returns its base URL and the raw request heads it received.
    async fn serve(route: Route) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let log = log.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).into_owned();
                    let path = head.split_whitespace().nth(1).unwrap_or("").to_string();
                    log.lock().unwrap().push(head);

                    let (status, body) = route(&path);
                    let resp = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        (url, seen)
    }

    fn requests(seen: &Mutex<Vec<String>>) -> Vec<String> {
        seen.lock().unwrap().iter().map(|r| r.to_lowercase()).collect()
    }

    #[test]
    fn base_url_defaults_and_trims() {
        assert_eq!(client("http://localhost:13378").base_url(), "http://localhost:13378");
        assert_eq!(client("").base_url(), DEFAULT_BASE_URL);
        assert_eq!(client("  ").base_url(), DEFAULT_BASE_URL);
        assert_eq!(client("https://abs.example.com/").base_url(), "https://abs.example.com");
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = AbsClient::new("not a url", "t", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builds_from_config() {
        let cfg = Config::from_lookup(|k| match k {
            "TELEGRAM_BOT_TOKEN" => Some("t".to_string()),
            "AUDIOBOOKSHELF_TOKEN" => Some("abs".to_string()),
            _ => None,
        })
        .unwrap();
        let c = AbsClient::from_config(&cfg).unwrap();
        assert_eq!(c.base_url(), "http://localhost:13378");
        assert_eq!(c.token, "abs");
    }

    #[test]
    fn endpoints_encode_each_segment() {
        let c = client("http://abs.lan:8080/abs/");
        let url = c.endpoint(&["api", "libraries", "a/b c", "items"]).unwrap();
        assert_eq!(url.as_str(), "http://abs.lan:8080/abs/api/libraries/a%2Fb%20c/items");

        let url = client("http://localhost:13378").endpoint(&["status"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:13378/status");
    }

    #[test]
    fn previews_long_bodies() {
        assert_eq!(preview("  short \n"), "short");
        let p = preview(&"e".repeat(300));
        assert_eq!(p.chars().count(), BODY_PREVIEW_CHARS + 3);
    }

    #[test]
    fn parses_search_hits_from_books_and_podcasts() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "book": [
                {"libraryItem": {"libraryId": "lib_1", "relPath": "Frank Herbert/Dune",
                                 "size": 1536, "addedAt": 1_700_000_000_000_i64, "media": {}},
                 "matchKey": "title", "matchText": "Dune"}
            ],
            "podcast": [
                {"libraryItem": {"libraryId": "lib_2", "relPath": "Dune Pod", "size": 10}}
            ],
            "authors": [{"name": "Frank Herbert"}],
            "series": []
        }))
        .unwrap();

        let books = resp.into_books();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].rel_path, "Frank Herbert/Dune");
        assert_eq!(books[0].added_at, 1_700_000_000_000);
        assert_eq!(books[1].library_id, "lib_2");
        assert_eq!(books[1].added_at, 0);
    }

    #[test]
    fn parses_counts_and_progress() {
        let page: ItemsPage =
            serde_json::from_value(json!({"results": [], "total": 57, "limit": 1, "page": 0}))
                .unwrap();
        assert_eq!(page.total, 57);
        assert!(serde_json::from_value::<ItemsPage>(json!({"results": []})).is_err());

        let user: UserProgressResponse = serde_json::from_value(json!({
            "id": "usr_1",
            "mediaProgress": [{"id": "p1", "libraryItemId": "li_1", "progress": 0.5, "isFinished": false}]
        }))
        .unwrap();
        assert_eq!(user.media_progress.len(), 1);
        assert_eq!(user.media_progress[0].library_item_id, "li_1");
    }

    #[tokio::test]
    async fn transport_errors_name_the_operation() {
        // Nothing listens on port 1.
        let c = client("http://127.0.0.1:1");
        let err = c.libraries().await.unwrap_err();
        assert!(matches!(err, Error::Transport { op: "list libraries", .. }));
        assert!(err.to_string().starts_with("list libraries request failed"));
    }

    #[tokio::test]
    async fn non_success_status_carries_op_and_body() {
        let (url, seen) = serve(|_| ("401 Unauthorized", "Unauthorized".to_string())).await;

        let err = client(&url).users().await.unwrap_err();
        match &err {
            Error::Status { op, status, body } => {
                assert_eq!(*op, "list users");
                assert_eq!(*status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let reqs = requests(&seen);
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].starts_with("get /api/users http/1.1"));
        assert!(reqs[0].contains("authorization: bearer test_token"));
    }

    #[tokio::test]
    async fn long_error_bodies_are_truncated() {
        let (url, _) = serve(|_| ("500 Internal Server Error", "x".repeat(1000))).await;

        let err = client(&url).current_user().await.unwrap_err();
        let Error::Status { op, status, body } = err else {
            panic!("expected a status error");
        };
        assert_eq!(op, "fetch current user");
        assert_eq!(status, 500);
        assert_eq!(body.chars().count(), BODY_PREVIEW_CHARS + 3);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let (url, seen) = serve(|_| ("200 OK", "not json".to_string())).await;

        let err = client(&url).library_item_count("lib 1").await.unwrap_err();
        assert!(matches!(err, Error::Decode { op: "count library items", .. }));

        let reqs = requests(&seen);
        assert!(reqs[0].starts_with("get /api/libraries/lib%201/items?limit=1&minified=1 "));
    }

    #[tokio::test]
    async fn empty_token_sends_no_authorization() {
        let (url, seen) = serve(|_| ("200 OK", json!({"users": []}).to_string())).await;

        let c = AbsClient::new(&url, "", Duration::from_secs(2)).unwrap();
        assert!(c.users().await.unwrap().is_empty());
        assert!(!requests(&seen)[0].contains("authorization:"));
    }

    fn library_routes(path: &str) -> (&'static str, String) {
        let hit = |lib: &str, title: &str| {
            json!({"libraryItem": {"libraryId": lib, "relPath": title}})
        };
        match path {
            "/api/libraries" => (
                "200 OK",
                json!({"libraries": [{"id": "lib_1", "name": "Books"}, {"id": "lib_2", "name": "Pods"}]})
                    .to_string(),
            ),
            p if p.starts_with("/api/libraries/lib_1/search") => (
                "200 OK",
                json!({"book": [hit("lib_1", "Dune"), hit("lib_1", "Dune Messiah")]}).to_string(),
            ),
            p if p.starts_with("/api/libraries/lib_2/search") => (
                "200 OK",
                json!({"podcast": [hit("lib_2", "Dune Pod")]}).to_string(),
            ),
            _ => ("404 Not Found", String::new()),
        }
    }

    #[tokio::test]
    async fn unscoped_search_merges_libraries_in_listing_order() {
        let (url, seen) = serve(library_routes).await;

        let books = client(&url).search_books("dune", None).await.unwrap();
        let titles: Vec<_> = books.iter().map(|b| b.rel_path.as_str()).collect();
        assert_eq!(titles, vec!["Dune", "Dune Messiah", "Dune Pod"]);
        assert_eq!(requests(&seen).len(), 3);
    }

    #[tokio::test]
    async fn scoped_search_hits_only_that_library() {
        let (url, seen) = serve(library_routes).await;

        let books = client(&url).search_books("dune", Some("lib_2")).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].library_id, "lib_2");

        let reqs = requests(&seen);
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].starts_with("get /api/libraries/lib_2/search?q=dune "));
    }

    #[tokio::test]
    async fn unscoped_search_fails_when_any_library_fails() {
        let (url, _) = serve(|path| match path {
            "/api/libraries" => (
                "200 OK",
                json!({"libraries": [{"id": "lib_1"}, {"id": "lib_2"}]}).to_string(),
            ),
            p if p.starts_with("/api/libraries/lib_1/search") => ("200 OK", "{}".to_string()),
            _ => ("503 Service Unavailable", "busy".to_string()),
        })
        .await;

        let err = client(&url).search_books("dune", None).await.unwrap_err();
        assert!(matches!(err, Error::Status { op: "search library", status: 503, .. }));
    }
}
