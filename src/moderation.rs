//! Report workflow for feed posts.
//!
//! A report starts out [`ReportStatus::Pending`]. An administrator then either marks
//! it safe, redacts the post (the report becomes [`ReportStatus::Unsafe`] and the
//! post keeps everything but its comment), or deletes the post and bans its
//! sender, which removes the report as well.
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    Result,
    db::{self, Db, Filter, StoreError, repository},
    metrics::{MODERATION_ACTIONS, REPORTS_SUBMITTED},
    models::{Notification, NotificationReport, ReportStatus, SYSTEM_SENDER, User},
};

/// A report together with the post it targets.
#[derive(Serialize, Debug, Clone)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: NotificationReport,
    pub notification: Option<Notification>,
}

/// File a report against a post. Reporting the same post twice returns the
/// existing report unchanged.
#[tracing::instrument(skip(db))]
pub async fn report(db: &Db, reporter_id: i64, notification_id: i64) -> Result<NotificationReport> {
    let (report, filed) = db::retry_sqlite(|| async move {
        let mut tx = db.begin().await?;
        let _: Notification = repository::require(&mut *tx, notification_id).await?;

        let existing: Option<NotificationReport> = repository::fetch_one(
            &mut *tx,
            Filter::eq("notification_id", notification_id)
                .and(Filter::eq("reporter_id", reporter_id)),
        )
        .await?;
        if let Some(existing) = existing {
            return Ok((existing, false));
        }

        let mut report = NotificationReport::pending(notification_id, reporter_id);
        _ = repository::insert(&mut *tx, &mut report).await?;
        db::commit(tx).await?;
        Ok((report, true))
    })
    .await?;
    if !filed {
        return Ok(report);
    }

    metrics::counter!(REPORTS_SUBMITTED).increment(1);
    info!(report = report.id, notification = notification_id, "report filed");
    Ok(report)
}

/// Every report, pending first, then safe, then unsafe. Oldest first within a
/// status.
pub async fn list_reports(db: &Db) -> Result<Vec<ReportView>> {
    let mut rows: Vec<(NotificationReport, Option<Notification>)> =
        db.get_many_including(Filter::All).await?;
    rows.sort_by_key(|(report, _)| (report.status, report.id));

    Ok(rows
        .into_iter()
        .map(|(report, notification)| ReportView {
            report,
            notification,
        })
        .collect())
}

#[tracing::instrument(skip(db))]
pub async fn mark_safe(db: &Db, report_id: i64) -> Result<NotificationReport> {
    let mut report: NotificationReport = db
        .get_by_id(report_id)
        .await?
        .ok_or_else(|| StoreError::missing::<NotificationReport>(report_id))?;

    report.status = ReportStatus::Safe;
    _ = db.update(&report).await?;

    metrics::counter!(MODERATION_ACTIONS, "action" => "safe").increment(1);
    info!(report = report_id, "report marked safe");
    Ok(report)
}

/// Mark the report unsafe and blank the comment of the reported post.
#[tracing::instrument(skip(db))]
pub async fn dismiss_with_redaction(db: &Db, report_id: i64) -> Result<NotificationReport> {
    let (report, post_id) = db::retry_sqlite(|| async move {
        let mut tx = db.begin().await?;

        let mut report: NotificationReport = repository::require(&mut *tx, report_id).await?;
        let mut post: Notification = repository::require(&mut *tx, report.notification_id).await?;

        report.status = ReportStatus::Unsafe;
        post.comment.clear();
        _ = repository::update(&mut *tx, &report).await?;
        _ = repository::update(&mut *tx, &post).await?;

        db::commit(tx).await?;
        Ok((report, post.id))
    })
    .await?;

    metrics::counter!(MODERATION_ACTIONS, "action" => "redact").increment(1);
    info!(report = report_id, notification = post_id, "post redacted");
    Ok(report)
}

/// Delete the report and the reported post, and ban the post's sender.
///
/// Either all of it happens or none of it does.
#[tracing::instrument(skip(db))]
pub async fn delete_and_ban(db: &Db, report_id: i64) -> Result<()> {
    let post = db::retry_sqlite(|| async move {
        let mut tx = db.begin().await?;

        let report: NotificationReport = repository::require(&mut *tx, report_id).await?;
        let post: Notification = repository::require(&mut *tx, report.notification_id).await?;

        _ = repository::delete_by_id::<NotificationReport>(&mut *tx, report.id).await?;
        _ = repository::delete_by_id::<Notification>(&mut *tx, post.id).await?;

        if post.sender_id == SYSTEM_SENDER {
            warn!(notification = post.id, "reported post is an announcement, nobody to ban");
        } else {
            let sender: Option<User> = repository::fetch_by_id(&mut *tx, post.sender_id).await?;
            match sender {
                Some(mut sender) => {
                    sender.is_banned = true;
                    _ = repository::update(&mut *tx, &sender).await?;
                }
                None => warn!(sender = post.sender_id, "sender no longer exists, nobody to ban"),
            }
        }

        db::commit(tx).await?;
        Ok(post)
    })
    .await?;

    metrics::counter!(MODERATION_ACTIONS, "action" => "ban").increment(1);
    info!(
        report = report_id,
        notification = post.id,
        sender = post.sender_id,
        "post deleted and sender banned"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;
    use crate::{
        models::{WatchData, WatchStatus},
        tests::{test_db, test_user},
    };

    async fn shared_post(db: &Db, sender: &User, comment: &str) -> Notification {
        let mut entry = WatchData::new(sender.id, "Heat");
        entry.status = WatchStatus::Watched;
        let mut post = Notification::snapshot(&entry, comment.to_owned());
        db.insert(&mut post).await.unwrap();
        post
    }

    #[tokio::test]
    async fn test_report_is_idempotent() {
        let (_dir, db) = test_db().await;
        let sender = test_user(&db, "sender").await;
        let reporter = test_user(&db, "reporter").await;
        let post = shared_post(&db, &sender, "spoilers").await;

        let first = report(&db, reporter.id, post.id).await.unwrap();
        let second = report(&db, reporter.id, post.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status, ReportStatus::Pending);
        assert_eq!(list_reports(&db).await.unwrap().len(), 1);

        let err = report(&db, reporter.id, post.id + 100).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_safe_then_redact() {
        let (_dir, db) = test_db().await;
        let sender = test_user(&db, "sender").await;
        let reporter = test_user(&db, "reporter").await;
        let post = shared_post(&db, &sender, "spoilers").await;
        let filed = report(&db, reporter.id, post.id).await.unwrap();

        assert_eq!(mark_safe(&db, filed.id).await.unwrap().status, ReportStatus::Safe);
        assert_eq!(mark_safe(&db, filed.id).await.unwrap().status, ReportStatus::Safe);

        let redacted = dismiss_with_redaction(&db, filed.id).await.unwrap();
        assert_eq!(redacted.status, ReportStatus::Unsafe);

        let stored: Notification = db.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.comment, "");
        assert_eq!(stored.title, post.title);

        let sender: User = db.get_by_id(sender.id).await.unwrap().unwrap();
        assert!(!sender.is_banned);
    }

    #[tokio::test]
    async fn test_delete_and_ban() {
        let (_dir, db) = test_db().await;
        let sender = test_user(&db, "sender").await;
        let reporter = test_user(&db, "reporter").await;
        let other = test_user(&db, "other").await;
        let post = shared_post(&db, &sender, "slur").await;
        let filed = report(&db, reporter.id, post.id).await.unwrap();
        let also = report(&db, other.id, post.id).await.unwrap();

        delete_and_ban(&db, filed.id).await.unwrap();

        assert!(db.get_by_id::<NotificationReport>(filed.id).await.unwrap().is_none());
        assert!(db.get_by_id::<NotificationReport>(also.id).await.unwrap().is_none());
        assert!(db.get_by_id::<Notification>(post.id).await.unwrap().is_none());
        let sender: User = db.get_by_id(sender.id).await.unwrap().unwrap();
        assert!(sender.is_banned);

        let err = delete_and_ban(&db, filed.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    async fn block_updates(db: &Db, table: &str) {
        let trigger = format!(
            "CREATE TRIGGER block_{table} BEFORE UPDATE ON {table} \
             BEGIN SELECT RAISE(ABORT, 'updates blocked'); END"
        );
        _ = sqlx::query(&trigger).execute(db.pool()).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_and_ban_is_atomic() {
        let (_dir, db) = test_db().await;
        let sender = test_user(&db, "sender").await;
        let reporter = test_user(&db, "reporter").await;
        let post = shared_post(&db, &sender, "slur").await;
        let filed = report(&db, reporter.id, post.id).await.unwrap();

        block_updates(&db, "users").await;
        let err = delete_and_ban(&db, filed.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let kept: Option<NotificationReport> = db.get_by_id(filed.id).await.unwrap();
        assert_eq!(kept, Some(filed));
        let stored: Option<Notification> = db.get_by_id(post.id).await.unwrap();
        assert_eq!(stored, Some(post));
        let sender: User = db.get_by_id(sender.id).await.unwrap().unwrap();
        assert!(!sender.is_banned);
    }

    #[tokio::test]
    async fn test_redaction_is_atomic() {
        let (_dir, db) = test_db().await;
        let sender = test_user(&db, "sender").await;
        let reporter = test_user(&db, "reporter").await;
        let post = shared_post(&db, &sender, "spoilers").await;
        let filed = report(&db, reporter.id, post.id).await.unwrap();

        block_updates(&db, "notifications").await;
        let err = dismiss_with_redaction(&db, filed.id).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let kept: NotificationReport = db.get_by_id(filed.id).await.unwrap().unwrap();
        assert_eq!(kept.status, ReportStatus::Pending);
        let stored: Notification = db.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(stored.comment, "spoilers");
    }

    #[tokio::test]
    async fn test_listing_order() {
        let (_dir, db) = test_db().await;
        let sender = test_user(&db, "sender").await;
        let reporter = test_user(&db, "reporter").await;

        let mut ids = Vec::new();
        for comment in ["a", "b", "c"] {
            let post = shared_post(&db, &sender, comment).await;
            ids.push(report(&db, reporter.id, post.id).await.unwrap().id);
        }
        dismiss_with_redaction(&db, ids[0]).await.unwrap();
        mark_safe(&db, ids[1]).await.unwrap();

        let listed = list_reports(&db).await.unwrap();
        let order: Vec<_> = listed.iter().map(|r| (r.report.id, r.report.status)).collect();
        assert_eq!(
            order,
            [
                (ids[2], ReportStatus::Pending),
                (ids[1], ReportStatus::Safe),
                (ids[0], ReportStatus::Unsafe),
            ]
        );
        assert!(listed.iter().all(|r| r.notification.is_some()));
    }
}
