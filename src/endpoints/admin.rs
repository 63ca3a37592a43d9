//! Moderation and content management. Every route requires the administrator
//! role, and every state change requires an explicit `{"confirm": true}`.
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    AppState, Error, Result,
    auth::Admin,
    config::AppConfig,
    db::Db,
    featured::{self, NewFeatured},
    feed,
    models::{FeaturedTitle, Notification, NotificationReport},
    moderation::{self, ReportView},
};

/// The yes/no gate in front of every moderation action.
#[derive(Deserialize, Debug, Default)]
struct Confirm {
    #[serde(default)]
    confirm: bool,
}

impl Confirm {
    fn require(&self) -> Result<()> {
        if self.confirm {
            Ok(())
        } else {
            Err(Error::bad_request("action must be confirmed"))
        }
    }
}

#[derive(Deserialize, Debug)]
struct NewAnnouncement {
    comment: String,
    #[serde(default)]
    confirm: bool,
}

#[derive(Deserialize, Debug)]
struct FeatureInput {
    #[serde(flatten)]
    featured: NewFeatured,
    #[serde(default)]
    confirm: bool,
}

async fn list_reports(_admin: Admin, State(db): State<Db>) -> Result<Json<Vec<ReportView>>> {
    Ok(Json(moderation::list_reports(&db).await?))
}

async fn mark_safe(
    Admin(admin): Admin,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(confirm): Json<Confirm>,
) -> Result<Json<NotificationReport>> {
    confirm.require()?;
    info!(admin = admin.id, report = id, "marking report safe");
    Ok(Json(moderation::mark_safe(&db, id).await?))
}

async fn redact(
    Admin(admin): Admin,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(confirm): Json<Confirm>,
) -> Result<Json<NotificationReport>> {
    confirm.require()?;
    info!(admin = admin.id, report = id, "redacting reported post");
    Ok(Json(moderation::dismiss_with_redaction(&db, id).await?))
}

async fn ban(
    Admin(admin): Admin,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(confirm): Json<Confirm>,
) -> Result<StatusCode> {
    confirm.require()?;
    info!(admin = admin.id, report = id, "deleting reported post and banning sender");
    moderation::delete_and_ban(&db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_announcements(_admin: Admin, State(db): State<Db>) -> Result<Json<Vec<Notification>>> {
    Ok(Json(feed::list_announcements(&db).await?))
}

async fn create_announcement(
    _admin: Admin,
    State(db): State<Db>,
    Json(input): Json<NewAnnouncement>,
) -> Result<(StatusCode, Json<Notification>)> {
    Confirm {
        confirm: input.confirm,
    }
    .require()?;
    let post = feed::create_announcement(&db, &input.comment).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn delete_announcement(
    _admin: Admin,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(confirm): Json<Confirm>,
) -> Result<StatusCode> {
    confirm.require()?;
    feed::delete_announcement(&db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn all_featured(_admin: Admin, State(db): State<Db>) -> Result<Json<Vec<FeaturedTitle>>> {
    Ok(Json(featured::all_featured(&db).await?))
}

async fn create_featured(
    _admin: Admin,
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Json(input): Json<FeatureInput>,
) -> Result<(StatusCode, Json<FeaturedTitle>)> {
    Confirm {
        confirm: input.confirm,
    }
    .require()?;
    let created =
        featured::create_featured(&db, input.featured, config.featured.lifetime_months).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_featured(
    _admin: Admin,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(confirm): Json<Confirm>,
) -> Result<StatusCode> {
    confirm.require()?;
    featured::delete_featured(&db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports", get(list_reports))
        .route("/reports/{id}/safe", post(mark_safe))
        .route("/reports/{id}/redact", post(redact))
        .route("/reports/{id}/ban", post(ban))
        .route("/announcements", get(list_announcements).post(create_announcement))
        .route("/announcements/{id}", delete(delete_announcement))
        .route("/featured", get(all_featured).post(create_featured))
        .route("/featured/{id}", delete(delete_featured))
}
