use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Result,
    auth::AuthenticatedUser,
    config::AppConfig,
    db::{Db, queries::TitleCount},
    featured,
    models::{FeaturedTitle, User},
};

#[derive(Deserialize, Debug, Default)]
struct UserSearchParams {
    #[serde(default)]
    search: String,
    #[serde(default)]
    offset: i64,
}

#[derive(Serialize, Debug)]
struct UserPage {
    users: Vec<User>,
    has_more: bool,
}

async fn search_users(
    user: Option<AuthenticatedUser>,
    State(db): State<Db>,
    State(config): State<AppConfig>,
    Query(params): Query<UserSearchParams>,
) -> Result<Json<UserPage>> {
    let count = config.feed.user_page_size;
    let users = db
        .search_users(&params.search, count, params.offset.max(0), user.map(|u| u.id))
        .await?;

    let has_more = i64::try_from(users.len()).is_ok_and(|len| len == count);
    Ok(Json(UserPage { users, has_more }))
}

async fn top_watched(State(db): State<Db>) -> Result<Json<Vec<TitleCount>>> {
    Ok(Json(db.get_top_watched_titles().await?))
}

async fn active_featured(State(db): State<Db>) -> Result<Json<Vec<FeaturedTitle>>> {
    Ok(Json(featured::active_featured(&db).await?))
}

pub(super) fn routes() -> Router<AppState> {
    // OG /api/users
    // UG /api/stats/top-watched
    // UG /api/featured
    Router::new()
        .route("/users", get(search_users))
        .route("/stats/top-watched", get(top_watched))
        .route("/featured", get(active_featured))
}
