//! The social feed and system announcements.
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::info;

use crate::{
    Result,
    db::{Db, Filter, StoreError},
    models::{Notification, NotificationReport, SYSTEM_SENDER, User},
    validation,
};

#[derive(Serialize, Debug, Clone)]
pub struct FeedItem {
    #[serde(flatten)]
    pub notification: Notification,
    /// Empty for announcements and for senders that no longer exist.
    pub sender: String,
    pub summary: String,
    /// Whether the viewer has already reported this post.
    pub reported: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// A full page might be followed by more. A short one never is.
    pub has_more: bool,
}

/// One page of the feed as seen by `viewer`. The viewer's own posts are left out.
#[tracing::instrument(skip(db))]
pub async fn feed(db: &Db, viewer: Option<i64>, offset: i64, page_size: i64) -> Result<FeedPage> {
    let posts = db
        .get_notifications(viewer, page_size, offset.max(0))
        .await?;

    let sender_ids: HashSet<i64> = posts
        .iter()
        .map(|n| n.sender_id)
        .filter(|id| *id != SYSTEM_SENDER)
        .collect();
    let senders: HashMap<i64, String> = db
        .get_many::<User>(Filter::is_in("id", sender_ids))
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let reported: HashSet<i64> = match viewer {
        Some(viewer) => db
            .get_many::<NotificationReport>(
                Filter::eq("reporter_id", viewer)
                    .and(Filter::is_in("notification_id", posts.iter().map(|n| n.id))),
            )
            .await?
            .into_iter()
            .map(|r| r.notification_id)
            .collect(),
        None => HashSet::new(),
    };

    let has_more = i64::try_from(posts.len()).is_ok_and(|len| len == page_size);
    let items = posts
        .into_iter()
        .map(|notification| {
            let sender = senders
                .get(&notification.sender_id)
                .cloned()
                .unwrap_or_default();
            FeedItem {
                summary: notification.summary(&sender),
                reported: reported.contains(&notification.id),
                sender,
                notification,
            }
        })
        .collect();

    Ok(FeedPage { items, has_more })
}

/// Every system announcement, newest first.
pub async fn list_announcements(db: &Db) -> Result<Vec<Notification>> {
    let mut posts: Vec<Notification> = db.get_many(Filter::eq("sender_id", SYSTEM_SENDER)).await?;
    posts.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(posts)
}

pub async fn create_announcement(db: &Db, comment: &str) -> Result<Notification> {
    validation::announcement(comment)?;

    let mut post = Notification::announcement(comment.trim());
    _ = db.insert(&mut post).await?;

    info!(notification = post.id, "announcement posted");
    Ok(post)
}

/// Remove an announcement. Ids of user posts are treated as unknown.
pub async fn delete_announcement(db: &Db, id: i64) -> Result<()> {
    let post: Option<Notification> = db
        .get_one(Filter::eq("id", id).and(Filter::eq("sender_id", SYSTEM_SENDER)))
        .await?;
    let post = post.ok_or_else(|| StoreError::missing::<Notification>(id))?;

    _ = db.delete(&post).await?;
    info!(notification = id, "announcement deleted");
    Ok(())
}
