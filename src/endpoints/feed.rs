use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    AppState, Result,
    auth::AuthenticatedUser,
    config::AppConfig,
    db::Db,
    feed::{self, FeedPage},
    models::NotificationReport,
    moderation,
};

#[derive(Deserialize, Debug, Default)]
struct FeedParams {
    #[serde(default)]
    offset: i64,
}

async fn get_feed(
    user: Option<AuthenticatedUser>,
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage>> {
    let viewer = user.map(|u| u.id);
    Ok(Json(
        feed::feed(&db, viewer, params.offset, config.feed.page_size).await?,
    ))
}

async fn report(
    user: AuthenticatedUser,
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<NotificationReport>> {
    Ok(Json(moderation::report(&db, user.id, id).await?))
}

pub(super) fn routes() -> Router<AppState> {
    // OG /api/feed
    // AP /api/feed/{id}/report
    Router::new()
        .route("/feed", get(get_feed))
        .route("/feed/{id}/report", post(report))
}
