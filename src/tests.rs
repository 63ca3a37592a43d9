//! Testing utilities.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use anyhow::{Context as _, Result};
use chrono::Utc;
use figment::{Figment, providers::Format as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    AppState,
    config::AppConfig,
    db::Db,
    identity::{self, ADMIN_ROLE, Credentials},
    models::User,
};

/// A temporary test directory that will be cleaned up when the struct is dropped.
pub(crate) struct TempDir {
    /// The path to the directory.
    path: PathBuf,
}

impl TempDir {
    /// Create a new temporary directory.
    fn new() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("mediaful-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Get the path to the directory.
    fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// A fresh, migrated database. Keep the directory alive for as long as the
/// database is in use.
pub(crate) async fn test_db() -> (TempDir, Db) {
    let dir = TempDir::new().expect("should be able to create temp dir");
    let url = format!("sqlite://{}/test.db", dir.path().display());
    let db = Db::connect(&url)
        .await
        .expect("should be able to open test database");
    (dir, db)
}

/// Insert a user directly, skipping password hashing.
pub(crate) async fn test_user(db: &Db, username: &str) -> User {
    let mut user = User {
        id: 0,
        username: username.to_owned(),
        normalized_username: username.to_uppercase(),
        password_hash: String::new(),
        is_banned: false,
        created_at: Utc::now(),
    };
    db.insert(&mut user)
        .await
        .expect("should be able to insert test user");
    user
}

/// A running server on a free port, with its own database.
pub(crate) struct TestState {
    /// The temporary directory for test data.
    _temp_dir: TempDir,
    /// The address the test server is listening on.
    address: SocketAddr,
    /// The data access handle shared with the server.
    db: Db,
    /// The HTTP client.
    client: reqwest::Client,
}

impl TestState {
    /// Start the application in a background task.
    async fn start() -> Result<Self> {
        let temp_dir = TempDir::new()?;

        // Configure the test app
        #[derive(Serialize, Deserialize)]
        struct TestConfigInput {
            db: String,
            uploads: Uploads,
        }
        #[derive(Serialize, Deserialize)]
        struct Uploads {
            path: PathBuf,
        }

        let test_config = TestConfigInput {
            db: format!("sqlite://{}/test.db", temp_dir.path().display()),
            uploads: Uploads {
                path: temp_dir.path().join("uploads"),
            },
        };

        let config: AppConfig = Figment::new()
            .admerge(figment::providers::Toml::file("default.toml"))
            .merge(figment::providers::Serialized::defaults(test_config))
            .merge(figment::providers::Toml::string("[feed]\npage_size = 2"))
            .extract()?;

        std::fs::create_dir_all(&config.uploads.path)?;
        std::fs::write(config.uploads.path.join("poster.png"), b"not really a png")?;

        let db = Db::connect(&config.db).await?;
        let listener =
            tokio::net::TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
                .await
                .context("failed to bind address")?;
        let address = listener.local_addr()?;

        let app = crate::serve::app(AppState {
            config,
            db: db.clone(),
        });
        drop(tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .await
                .context("failed to serve app")
        }));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            _temp_dir: temp_dir,
            address,
            db,
            client,
        })
    }

    /// Get a base URL for the test server.
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    /// Register an account and log it in. Returns the bearer token.
    async fn create_test_account(&self, username: &str) -> Result<String> {
        let creds = json!({ "username": username, "password": "password123" });

        let response = self
            .client
            .post(self.url("/api/account"))
            .json(&creds)
            .send()
            .await?;
        anyhow::ensure!(
            response.status() == StatusCode::CREATED,
            "failed to create account: {}",
            response.status()
        );

        let session: Value = self
            .client
            .post(self.url("/api/session"))
            .json(&creds)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        session["token"]
            .as_str()
            .map(str::to_owned)
            .context("session has no token")
    }

    /// Create an administrator and log it in.
    async fn create_admin(&self, username: &str) -> Result<String> {
        let creds = Credentials {
            username: username.to_owned(),
            password: "password123".to_owned(),
        };
        let user = identity::register(&self.db, &creds).await?;
        self.db.add_role(user.id, ADMIN_ROLE).await?;

        Ok(identity::login(&self.db, &creds).await?.token)
    }
}

#[tokio::test]
async fn test_index_and_images() -> Result<()> {
    let state = TestState::start().await?;

    let index = state.client.get(state.url("/")).send().await?;
    assert_eq!(index.status(), StatusCode::OK);
    assert!(index.text().await?.contains("/api/"));

    let image = state.client.get(state.url("/images/poster.png")).send().await?;
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.bytes().await?.as_ref(), b"not really a png");

    Ok(())
}

#[tokio::test]
async fn test_logout() -> Result<()> {
    let state = TestState::start().await?;
    let ana = state.create_test_account("ana").await?;

    let logout = state
        .client
        .delete(state.url("/api/session"))
        .bearer_auth(&ana)
        .send()
        .await?;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let collection = state
        .client
        .get(state.url("/api/collection"))
        .bearer_auth(&ana)
        .send()
        .await?;
    assert_eq!(collection.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_log_share_and_feed() -> Result<()> {
    let state = TestState::start().await?;
    let ana = state.create_test_account("ana").await?;
    let ben = state.create_test_account("ben").await?;

    let unauthenticated = state
        .client
        .post(state.url("/api/collection"))
        .json(&json!({ "title": "Heat" }))
        .send()
        .await?;
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    for _ in 0..2 {
        state
            .client
            .post(state.url("/api/collection"))
            .bearer_auth(&ana)
            .json(&json!({
                "title": "Heat",
                "status": "watched",
                "rating": "liked",
                "share": true,
                "comment": "still great",
            }))
            .send()
            .await?
            .error_for_status()?;
    }

    let collection: Value = state
        .client
        .get(state.url("/api/collection"))
        .bearer_auth(&ana)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(collection.as_array().map(Vec::len), Some(1));
    assert_eq!(collection[0]["times_watched"], 2);

    // Ana's own posts are hidden from her feed.
    let own: Value = state
        .client
        .get(state.url("/api/feed"))
        .bearer_auth(&ana)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(own["items"].as_array().map(Vec::len), Some(0));

    let feed: Value = state
        .client
        .get(state.url("/api/feed"))
        .bearer_auth(&ben)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(feed["has_more"], true);
    assert_eq!(feed["items"][0]["sender"], "ana");
    assert_eq!(feed["items"][0]["summary"], "ana has finished watching Heat!");
    assert_eq!(feed["items"][0]["times_watched"], 2);
    assert_eq!(feed["items"][1]["times_watched"], 1);

    let top: Value = state
        .client
        .get(state.url("/api/stats/top-watched"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(top[0]["title"], "Heat");
    assert_eq!(top[0]["count"], 1);

    let users: Value = state
        .client
        .get(state.url("/api/users?search=A"))
        .bearer_auth(&ben)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(users["users"][0]["username"], "ana");
    assert!(users["users"][0].get("password_hash").is_none());

    Ok(())
}

#[tokio::test]
async fn test_report_and_ban() -> Result<()> {
    let state = TestState::start().await?;
    let ana = state.create_test_account("ana").await?;
    let ben = state.create_test_account("ben").await?;
    let admin = state.create_admin("moderator").await?;

    let logged: Value = state
        .client
        .post(state.url("/api/collection"))
        .bearer_auth(&ana)
        .json(&json!({ "title": "Heat", "status": "watching", "share": true, "comment": "rude" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let post_id = logged["shared"]["id"].as_i64().context("post was not shared")?;

    let report: Value = state
        .client
        .post(state.url(&format!("/api/feed/{post_id}/report")))
        .bearer_auth(&ben)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let report_id = report["id"].as_i64().context("report has no id")?;
    assert_eq!(report["status"], "pending");

    let forbidden = state
        .client
        .get(state.url("/api/admin/reports"))
        .bearer_auth(&ben)
        .send()
        .await?;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let reports: Value = state
        .client
        .get(state.url("/api/admin/reports"))
        .bearer_auth(&admin)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(reports[0]["notification"]["comment"], "rude");

    let unconfirmed = state
        .client
        .post(state.url(&format!("/api/admin/reports/{report_id}/ban")))
        .bearer_auth(&admin)
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(unconfirmed.status(), StatusCode::BAD_REQUEST);

    let banned = state
        .client
        .post(state.url(&format!("/api/admin/reports/{report_id}/ban")))
        .bearer_auth(&admin)
        .json(&json!({ "confirm": true }))
        .send()
        .await?;
    assert_eq!(banned.status(), StatusCode::NO_CONTENT);

    let feed: Value = state
        .client
        .get(state.url("/api/feed"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(feed["items"].as_array().map(Vec::len), Some(0));

    // Banned users still log, but nothing reaches the feed.
    let logged: Value = state
        .client
        .post(state.url("/api/collection"))
        .bearer_auth(&ana)
        .json(&json!({ "title": "Ronin", "status": "watched", "share": true }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert!(logged["shared"].is_null());
    assert_eq!(logged["entry"]["times_watched"], 1);

    Ok(())
}

#[tokio::test]
async fn test_admin_content() -> Result<()> {
    let state = TestState::start().await?;
    let admin = state.create_admin("moderator").await?;

    let created = state
        .client
        .post(state.url("/api/admin/featured"))
        .bearer_auth(&admin)
        .json(&json!({
            "description": "Heat, in cinemas again",
            "image_path": "poster.png",
            "confirm": true,
        }))
        .send()
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);

    let rejected = state
        .client
        .post(state.url("/api/admin/featured"))
        .bearer_auth(&admin)
        .json(&json!({ "description": "x", "image_path": "notes.txt", "confirm": true }))
        .send()
        .await?;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let featured: Value = state
        .client
        .get(state.url("/api/featured"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(featured[0]["image_path"], "poster.png");

    let announcement: Value = state
        .client
        .post(state.url("/api/admin/announcements"))
        .bearer_auth(&admin)
        .json(&json!({ "comment": "Maintenance tonight", "confirm": true }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    assert_eq!(announcement["title"], "[SYSTEM ANNOUNCEMENT]");

    let feed: Value = state
        .client
        .get(state.url("/api/feed"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(feed["items"][0]["comment"], "Maintenance tonight");
    assert_eq!(feed["items"][0]["sender"], "");

    let id = announcement["id"].as_i64().context("announcement has no id")?;
    let deleted = state
        .client
        .delete(state.url(&format!("/api/admin/announcements/{id}")))
        .bearer_auth(&admin)
        .json(&json!({ "confirm": true }))
        .send()
        .await?;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    Ok(())
}
