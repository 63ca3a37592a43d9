//! Hand-written reads that don't fit the generic record access.
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite};

use super::{Db, Filter, StoreResult};
use crate::models::{Notification, User, WatchStatus};

/// Number of titles returned by [`Db::get_top_watched_titles`].
pub const TOP_WATCHED_LIMIT: i64 = 5;
/// Sessions older than this no longer authenticate.
pub const SESSION_LIFETIME_DAYS: i64 = 30;

/// A title and the number of users who have watched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TitleCount {
    pub title: String,
    pub count: i64,
}

impl Db {
    /// One page of the feed, newest first.
    ///
    /// Posts by `exclude_sender` are left out. Fewer than `count` rows means the
    /// feed is exhausted.
    #[tracing::instrument(skip(self))]
    pub async fn get_notifications(
        &self,
        exclude_sender: Option<i64>,
        count: i64,
        offset: i64,
    ) -> StoreResult<Vec<Notification>> {
        let filter = exclude_sender.map_or(Filter::All, |id| Filter::ne("sender_id", id));

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM notifications WHERE ");
        filter.push_sql(&mut qb);
        qb.push(" ORDER BY id DESC LIMIT ")
            .push_bind(count)
            .push(" OFFSET ")
            .push_bind(offset);

        Ok(qb
            .build_query_as::<Notification>()
            .fetch_all(self.pool())
            .await?)
    }

    /// Users whose name contains `search`, ignoring case. A blank search matches
    /// everyone.
    #[tracing::instrument(skip(self))]
    pub async fn search_users(
        &self,
        search: &str,
        count: i64,
        offset: i64,
        exclude_user: Option<i64>,
    ) -> StoreResult<Vec<User>> {
        let mut filter = Filter::All;
        if !search.trim().is_empty() {
            filter = filter.and(Filter::contains("normalized_username", search));
        }
        if let Some(id) = exclude_user {
            filter = filter.and(Filter::ne("id", id));
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE ");
        filter.push_sql(&mut qb);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(count)
            .push(" OFFSET ")
            .push_bind(offset);

        Ok(qb.build_query_as::<User>().fetch_all(self.pool()).await?)
    }

    /// The most watched titles across all users, most watched first.
    pub async fn get_top_watched_titles(&self) -> StoreResult<Vec<TitleCount>> {
        let rows = sqlx::query_as::<_, TitleCount>(
            r#"
            SELECT title, COUNT(*) AS count
                FROM watch_data
                WHERE status = ?
                GROUP BY title
                ORDER BY count DESC, title ASC
                LIMIT ?
            "#,
        )
        .bind(WatchStatus::Watched)
        .bind(TOP_WATCHED_LIMIT)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}

/// Sessions and roles. These tables are keyed by text or by pairs, so they sit
/// outside the generic record access.
impl Db {
    pub async fn create_session(&self, token: &str, user_id: i64) -> StoreResult<()> {
        _ = sqlx::query("INSERT INTO sessions (id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(Utc::now())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// The user holding the session `token`, if the session exists and has not
    /// expired.
    pub async fn get_session_user(&self, token: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT users.*
                FROM sessions
                JOIN users ON users.id = sessions.user_id
                WHERE sessions.id = ? AND sessions.created_at > ?
            "#,
        )
        .bind(token)
        .bind(session_cutoff())
        .fetch_optional(self.pool())
        .await?;

        Ok(user)
    }

    /// Drop the session `token`. Returns whether it existed.
    pub async fn delete_session(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(token)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every session past [`SESSION_LIFETIME_DAYS`].
    pub async fn delete_expired_sessions(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE created_at <= ?")
            .bind(session_cutoff())
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Grant `role` to the user. Granting a role twice is a no-op.
    pub async fn add_role(&self, user_id: i64, role: &str) -> StoreResult<()> {
        _ = sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(user_id)
            .bind(role)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn has_role(&self, user_id: i64, role: &str) -> StoreResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM user_roles WHERE user_id = ? AND role = ?")
                .bind(user_id)
                .bind(role)
                .fetch_optional(self.pool())
                .await?;
        Ok(found.is_some())
    }

    pub async fn count_with_role(&self, role: &str) -> StoreResult<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role = ?")
                .bind(role)
                .fetch_one(self.pool())
                .await?,
        )
    }
}

fn session_cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::days(SESSION_LIFETIME_DAYS)
}
