//! Users' watch logs.
//!
//! A user has at most one entry per title. Logging a title that is already in the
//! collection updates that entry in place; see [`merge`] for the rules.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::{
    Error, Result,
    db::{self, Db, Filter, repository},
    metrics::{FEED_SHARED, WATCH_LOGGED},
    models::{Notification, Rating, User, WatchData, WatchStatus},
    validation,
};

/// A watch log submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchDataInput {
    pub title: String,
    #[serde(default)]
    pub status: WatchStatus,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_tv_show: bool,
    pub tv_season: Option<i64>,
    pub tv_episode: Option<i64>,
    /// Baseline watch date for entries that already exist.
    pub first_watch_date: Option<DateTime<Utc>>,
}

/// Whether to post the logged entry to the feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    pub share: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogOutcome {
    pub entry: WatchData,
    /// The feed post, if one was created.
    pub shared: Option<Notification>,
}

/// Fields a user may change when editing an entry from their collection.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryEdit {
    pub status: WatchStatus,
    pub rating: Rating,
    pub is_favorite: bool,
}

/// Fold `incoming` into the user's existing entry for the same title, or build a
/// new one.
///
/// For an existing entry every descriptive field is overwritten and
/// `last_watched` falls back to the submitted date. Logging it as watched stamps
/// `last_watched` with `now` and bumps the watch count. `first_watch_date` is
/// only ever filled while empty. A new entry starts with a count of one and both
/// dates at `now` when logged as watched, otherwise with no dates and a count of
/// zero.
pub(crate) fn merge(
    existing: Option<WatchData>,
    user_id: i64,
    incoming: WatchDataInput,
    now: DateTime<Utc>,
) -> WatchData {
    match existing {
        Some(mut entry) => {
            entry.status = incoming.status;
            entry.rating = incoming.rating;
            entry.is_favorite = incoming.is_favorite;
            entry.is_tv_show = incoming.is_tv_show;
            entry.tv_season = incoming.tv_season;
            entry.tv_episode = incoming.tv_episode;
            entry.last_watched = incoming.first_watch_date;

            if entry.status == WatchStatus::Watched {
                entry.last_watched = Some(now);
                entry.times_watched += 1;
            }
            if entry.first_watch_date.is_none() {
                entry.first_watch_date = entry.last_watched;
            }
            entry
        }
        None => {
            let mut entry = WatchData {
                status: incoming.status,
                rating: incoming.rating,
                is_favorite: incoming.is_favorite,
                is_tv_show: incoming.is_tv_show,
                tv_season: incoming.tv_season,
                tv_episode: incoming.tv_episode,
                ..WatchData::new(user_id, &incoming.title)
            };
            if entry.status == WatchStatus::Watched {
                entry.last_watched = Some(now);
                entry.first_watch_date = entry.last_watched;
                entry.times_watched = 1;
            }
            entry
        }
    }
}

async fn upsert(
    conn: &mut SqliteConnection,
    user_id: i64,
    incoming: WatchDataInput,
) -> db::StoreResult<WatchData> {
    let existing: Option<WatchData> = repository::fetch_one(
        conn,
        Filter::eq("user_id", user_id).and(Filter::eq("title", incoming.title.as_str())),
    )
    .await?;

    let is_new = existing.is_none();
    let mut entry = merge(existing, user_id, incoming, Utc::now());

    if is_new {
        _ = repository::insert(conn, &mut entry).await?;
    } else {
        _ = repository::update(conn, &entry).await?;
    }
    debug!(entry = entry.id, is_new, "watch entry stored");

    Ok(entry)
}

/// Log a title into the user's collection.
pub async fn log_watch_data(db: &Db, user_id: i64, incoming: WatchDataInput) -> Result<WatchData> {
    let outcome = log_and_share(db, user_id, incoming, ShareRequest::default()).await?;
    Ok(outcome.entry)
}

/// Log a title and, if requested, post a snapshot of the stored entry to the feed.
///
/// Both writes commit together. Share requests from banned users are dropped.
#[tracing::instrument(skip(db, incoming, share), fields(title = %incoming.title))]
pub async fn log_and_share(
    db: &Db,
    user_id: i64,
    incoming: WatchDataInput,
    share: ShareRequest,
) -> Result<LogOutcome> {
    validation::title(&incoming.title)?;
    let comment = share.comment.unwrap_or_default();
    validation::comment(&comment)?;

    let (incoming, comment, share) = (&incoming, comment.as_str(), share.share);
    let outcome = db::retry_sqlite(|| async move {
        let mut tx = db.begin().await?;
        let entry = upsert(&mut *tx, user_id, incoming.clone()).await?;

        let shared = if share {
            let user: User = repository::require(&mut *tx, user_id).await?;
            if user.is_banned {
                info!("user is banned from sharing, not posting to the feed");
                None
            } else {
                let mut post = Notification::snapshot(&entry, comment.to_owned());
                _ = repository::insert(&mut *tx, &mut post).await?;
                Some(post)
            }
        } else {
            None
        };

        db::commit(tx).await?;
        Ok(LogOutcome { entry, shared })
    })
    .await?;

    metrics::counter!(WATCH_LOGGED).increment(1);
    if outcome.shared.is_some() {
        metrics::counter!(FEED_SHARED).increment(1);
    }

    Ok(outcome)
}

/// A user's collection, optionally narrowed by a search (see [`WatchData::matches`]).
pub async fn collection(db: &Db, user_id: i64, search: Option<&str>) -> Result<Vec<WatchData>> {
    let entries: Vec<WatchData> = db.get_many(Filter::eq("user_id", user_id)).await?;

    Ok(match search {
        Some(search) => entries.into_iter().filter(|e| e.matches(search)).collect(),
        None => entries,
    })
}

async fn owned_entry(db: &Db, user_id: i64, id: i64) -> Result<WatchData> {
    let entry: WatchData = db
        .get_by_id(id)
        .await?
        .ok_or_else(|| db::StoreError::missing::<WatchData>(id))?;

    if entry.user_id != user_id {
        return Err(Error::forbidden("entry belongs to another user"));
    }
    Ok(entry)
}

/// Change the status, rating or favourite flag of an entry. Counters and dates
/// are left alone.
#[tracing::instrument(skip(db, edit))]
pub async fn edit_entry(db: &Db, user_id: i64, id: i64, edit: EntryEdit) -> Result<WatchData> {
    let mut entry = owned_entry(db, user_id, id).await?;
    entry.status = edit.status;
    entry.rating = edit.rating;
    entry.is_favorite = edit.is_favorite;

    _ = db.update(&entry).await?;
    Ok(entry)
}

#[tracing::instrument(skip(db))]
pub async fn delete_entry(db: &Db, user_id: i64, id: i64) -> Result<()> {
    let entry = owned_entry(db, user_id, id).await?;
    _ = db.delete(&entry).await?;
    info!(entry = id, "watch entry deleted");
    Ok(())
}
