//! Persisted records.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::{BelongsTo, Entity, Value};

/// `sender_id` of notifications posted by administrators.
pub const SYSTEM_SENDER: i64 = 0;
/// Title given to every system announcement.
pub const ANNOUNCEMENT_TITLE: &str = "[SYSTEM ANNOUNCEMENT]";

/// Watch status of a logged title.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum WatchStatus {
    #[default]
    Undefined = 0,
    Watchlist = 1,
    Watching = 2,
    Watched = 3,
}

impl WatchStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Watchlist => "Watchlist",
            Self::Watching => "Watching",
            Self::Watched => "Watched",
        }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum Rating {
    #[default]
    Undefined = 0,
    Liked = 1,
    Disliked = 2,
}

impl Rating {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Liked => "Liked",
            Self::Disliked => "Disliked",
        }
    }
}

/// Moderation state of a report. Ordered the way reports are listed.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ReportStatus {
    #[default]
    Pending = 0,
    Safe = 1,
    Unsafe = 2,
}

impl From<WatchStatus> for Value {
    fn from(v: WatchStatus) -> Self {
        Self::Int(v as i64)
    }
}

impl From<Rating> for Value {
    fn from(v: Rating) -> Self {
        Self::Int(v as i64)
    }
}

impl From<ReportStatus> for Value {
    fn from(v: ReportStatus) -> Self {
        Self::Int(v as i64)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub normalized_username: String,
    #[serde(skip)]
    pub password_hash: String,
    /// Banned users can no longer share to the feed.
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const NAME: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("username", self.username.clone().into()),
            ("normalized_username", self.normalized_username.clone().into()),
            ("password_hash", self.password_hash.clone().into()),
            ("is_banned", self.is_banned.into()),
            ("created_at", self.created_at.into()),
        ]
    }
}

/// A title in a user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct WatchData {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub status: WatchStatus,
    pub times_watched: i64,
    /// Set once, the first time the title is logged as watched.
    pub first_watch_date: Option<DateTime<Utc>>,
    pub last_watched: Option<DateTime<Utc>>,
    pub rating: Rating,
    pub is_tv_show: bool,
    pub tv_season: Option<i64>,
    pub tv_episode: Option<i64>,
    pub is_favorite: bool,
}

impl WatchData {
    /// An empty, unsaved entry.
    pub fn new(user_id: i64, title: &str) -> Self {
        Self {
            id: 0,
            user_id,
            title: title.to_owned(),
            status: WatchStatus::Undefined,
            times_watched: 0,
            first_watch_date: None,
            last_watched: None,
            rating: Rating::Undefined,
            is_tv_show: false,
            tv_season: None,
            tv_episode: None,
            is_favorite: false,
        }
    }

    /// Whether this entry should show up for a collection search.
    ///
    /// Besides the title, a query can name a kind ("tv", "show", "movie"), a
    /// status or rating, "fav", or a watch count.
    pub fn matches(&self, search: &str) -> bool {
        let search = search.trim().to_lowercase();
        if search.is_empty() {
            return true;
        }
        let has = |needle: &str| search.contains(needle);

        self.title.to_lowercase().contains(&search)
            || (self.is_tv_show && (has("tv") || has("television") || has("show")))
            || (!self.is_tv_show && has("movie"))
            || self.status.as_str().to_lowercase().contains(&search)
            || self.rating.as_str().to_lowercase().contains(&search)
            || (self.is_favorite && has("fav"))
            || self.times_watched.to_string().contains(&search)
    }
}

impl Entity for WatchData {
    const TABLE: &'static str = "watch_data";
    const NAME: &'static str = "watch entry";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("user_id", self.user_id.into()),
            ("title", self.title.clone().into()),
            ("status", self.status.into()),
            ("times_watched", self.times_watched.into()),
            ("first_watch_date", self.first_watch_date.into()),
            ("last_watched", self.last_watched.into()),
            ("rating", self.rating.into()),
            ("is_tv_show", self.is_tv_show.into()),
            ("tv_season", self.tv_season.into()),
            ("tv_episode", self.tv_episode.into()),
            ("is_favorite", self.is_favorite.into()),
        ]
    }
}

/// A feed post: a frozen copy of a watch entry plus a comment.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub sender_id: i64,
    pub title: String,
    pub status: WatchStatus,
    pub times_watched: i64,
    pub rating: Rating,
    pub is_tv_show: bool,
    pub tv_season: Option<i64>,
    pub tv_episode: Option<i64>,
    pub is_favorite: bool,
    pub comment: String,
}

impl Notification {
    /// Copy the shareable fields of `entry`.
    pub fn snapshot(entry: &WatchData, comment: String) -> Self {
        Self {
            id: 0,
            sender_id: entry.user_id,
            title: entry.title.clone(),
            status: entry.status,
            times_watched: entry.times_watched,
            rating: entry.rating,
            is_tv_show: entry.is_tv_show,
            tv_season: entry.tv_season,
            tv_episode: entry.tv_episode,
            is_favorite: entry.is_favorite,
            comment,
        }
    }

    pub fn announcement(comment: &str) -> Self {
        Self {
            id: 0,
            sender_id: SYSTEM_SENDER,
            title: ANNOUNCEMENT_TITLE.to_owned(),
            status: WatchStatus::Undefined,
            times_watched: 0,
            rating: Rating::Undefined,
            is_tv_show: false,
            tv_season: None,
            tv_episode: None,
            is_favorite: false,
            comment: comment.to_owned(),
        }
    }

    /// One-line description of the post as seen in the feed.
    pub fn summary(&self, sender: &str) -> String {
        match self.status {
            WatchStatus::Watchlist => {
                format!("{sender} has added {} to their watchlist!", self.title)
            }
            WatchStatus::Watching => format!("{sender} has started watching {}", self.title),
            WatchStatus::Watched => {
                let mut msg = format!("{sender} has finished watching ");
                if let (true, Some(season)) = (self.is_tv_show, self.tv_season) {
                    msg.push_str(&format!("Season {season}"));
                    if let Some(episode) = self.tv_episode {
                        msg.push_str(&format!(", Episode {episode}"));
                    }
                    msg.push_str(" of ");
                }
                msg.push_str(&self.title);
                msg.push('!');
                msg
            }
            WatchStatus::Undefined => {
                format!("{sender} has added {} to their collection!", self.title)
            }
        }
    }
}

impl Entity for Notification {
    const TABLE: &'static str = "notifications";
    const NAME: &'static str = "notification";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("sender_id", self.sender_id.into()),
            ("title", self.title.clone().into()),
            ("status", self.status.into()),
            ("times_watched", self.times_watched.into()),
            ("rating", self.rating.into()),
            ("is_tv_show", self.is_tv_show.into()),
            ("tv_season", self.tv_season.into()),
            ("tv_episode", self.tv_episode.into()),
            ("is_favorite", self.is_favorite.into()),
            ("comment", self.comment.clone().into()),
        ]
    }
}

/// A user's flag against a feed post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct NotificationReport {
    pub id: i64,
    pub notification_id: i64,
    pub reporter_id: i64,
    pub status: ReportStatus,
}

impl NotificationReport {
    pub const fn pending(notification_id: i64, reporter_id: i64) -> Self {
        Self {
            id: 0,
            notification_id,
            reporter_id,
            status: ReportStatus::Pending,
        }
    }
}

impl Entity for NotificationReport {
    const TABLE: &'static str = "notification_reports";
    const NAME: &'static str = "report";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("notification_id", self.notification_id.into()),
            ("reporter_id", self.reporter_id.into()),
            ("status", self.status.into()),
        ]
    }
}

impl BelongsTo<Notification> for NotificationReport {
    fn parent_id(&self) -> i64 {
        self.notification_id
    }
}

/// Promotional banner. Expired rows are kept but no longer shown.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FeaturedTitle {
    pub id: i64,
    pub description: String,
    pub image_path: String,
    pub expiry: DateTime<Utc>,
}

impl Entity for FeaturedTitle {
    const TABLE: &'static str = "featured_titles";
    const NAME: &'static str = "featured title";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("description", self.description.clone().into()),
            ("image_path", self.image_path.clone().into()),
            ("expiry", self.expiry.into()),
        ]
    }
}
