use serde::{Deserialize, Serialize};

/// `GET /status` payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerStatus {
    pub app: String,
    pub server_version: String,
    pub language: String,
    pub is_init: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryFolder {
    pub id: String,
    #[serde(alias = "path")]
    pub full_path: String,
}

/// A media library as listed by `GET /api/libraries`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Library {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub folders: Vec<LibraryFolder>,
    pub display_order: i64,
    pub icon: String,
    pub provider: String,
    /// Milliseconds since epoch.
    pub created_at: i64,
    /// Milliseconds since epoch.
    #[serde(alias = "lastUpdate")]
    pub updated_at: i64,
}

/// A library plus its item count (fetched separately).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryWithStats {
    #[serde(flatten)]
    pub library: Library,
    pub item_count: u64,
}

/// A library item returned by search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Book {
    pub library_id: String,
    pub rel_path: String,
    pub size: u64,
    /// Milliseconds since epoch.
    pub added_at: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub download: bool,
    pub update: bool,
    pub delete: bool,
    pub upload: bool,
    pub access_all_libraries: bool,
    pub access_all_tags: bool,
    pub access_explicit_content: bool,
}

/// Listening progress for one library item (or podcast episode).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaProgress {
    pub id: String,
    pub library_item_id: String,
    pub episode_id: Option<String>,
    /// Seconds.
    pub duration: f64,
    /// Fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Seconds.
    pub current_time: f64,
    pub is_finished: bool,
    pub last_update: i64,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

/// A server account.
///
/// `media_progress` is never read from the user endpoints; the aggregation
/// layer attaches it from a separate per-user call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub is_active: bool,
    pub permissions: Permissions,
    /// Milliseconds since epoch (0 = unknown).
    pub created_at: i64,
    /// Milliseconds since epoch; `None` when the user never logged in.
    pub last_seen: Option<i64>,
    #[serde(skip_deserializing)]
    pub media_progress: Vec<MediaProgress>,
}

impl User {
    /// The built-in server owner account.
    pub fn is_root(&self) -> bool {
        self.user_type == "root" || self.id == "root"
    }

    pub fn finished_count(&self) -> usize {
        self.media_progress.iter().filter(|p| p.is_finished).count()
    }
}

/// Server status plus the library overview.
///
/// `libraries` is `None` when the library listing could not be fetched.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerOverview {
    pub status: ServerStatus,
    pub libraries: Option<Vec<LibraryWithStats>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn library_accepts_last_update_alias() {
        let lib: Library = serde_json::from_value(json!({
            "id": "lib_1",
            "name": "Audiobooks",
            "mediaType": "book",
            "folders": [{"id": "fol_1", "fullPath": "/audiobooks"}],
            "createdAt": 1_700_000_000_000_i64,
            "lastUpdate": 1_700_000_100_000_i64,
            "settings": {"coverAspectRatio": 1}
        }))
        .unwrap();

        assert_eq!(lib.media_type, "book");
        assert_eq!(lib.folders[0].full_path, "/audiobooks");
        assert_eq!(lib.updated_at, 1_700_000_100_000);
    }

    #[test]
    fn user_ignores_embedded_progress() {
        let user: User = serde_json::from_value(json!({
            "id": "usr_1",
            "username": "alice",
            "type": "admin",
            "isActive": true,
            "lastSeen": null,
            "permissions": {"download": true, "accessAllLibraries": true},
            "mediaProgress": [{"id": "p1"}],
            "createdAt": 1_700_000_000_000_i64
        }))
        .unwrap();

        assert!(user.media_progress.is_empty());
        assert!(user.permissions.download);
        assert!(user.permissions.access_all_libraries);
        assert_eq!(user.last_seen, None);
        assert!(!user.is_root());
    }
}
