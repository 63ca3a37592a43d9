use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;

use crate::{
    AppState, Result,
    auth::AuthenticatedUser,
    db::{Db, StoreError},
    models::{User, WatchData},
    watch_log::{self, EntryEdit, LogOutcome, ShareRequest, WatchDataInput},
};

#[derive(Deserialize, Debug, Default)]
struct SearchParams {
    search: Option<String>,
}

/// A log submission, optionally shared to the feed.
#[derive(Deserialize, Debug)]
struct LogInput {
    #[serde(flatten)]
    entry: WatchDataInput,
    #[serde(flatten)]
    share: ShareRequest,
}

async fn own_collection(
    user: AuthenticatedUser,
    State(db): State<Db>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<WatchData>>> {
    Ok(Json(
        watch_log::collection(&db, user.id, params.search.as_deref()).await?,
    ))
}

async fn user_collection(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<WatchData>>> {
    let _: User = db
        .get_by_id(id)
        .await?
        .ok_or_else(|| StoreError::missing::<User>(id))?;

    Ok(Json(
        watch_log::collection(&db, id, params.search.as_deref()).await?,
    ))
}

async fn log_entry(
    user: AuthenticatedUser,
    State(db): State<Db>,
    Json(input): Json<LogInput>,
) -> Result<Json<LogOutcome>> {
    Ok(Json(
        watch_log::log_and_share(&db, user.id, input.entry, input.share).await?,
    ))
}

async fn edit_entry(
    user: AuthenticatedUser,
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<EntryEdit>,
) -> Result<Json<WatchData>> {
    Ok(Json(watch_log::edit_entry(&db, user.id, id, input).await?))
}

async fn delete_entry(
    user: AuthenticatedUser,
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    watch_log::delete_entry(&db, user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) fn routes() -> Router<AppState> {
    // AG /api/collection
    // AP /api/collection
    // AU /api/collection/{id}
    // AD /api/collection/{id}
    // OG /api/users/{id}/collection
    Router::new()
        .route("/collection", get(own_collection).post(log_entry))
        .route("/collection/{id}", put(edit_entry).delete(delete_entry))
        .route("/users/{id}/collection", get(user_collection))
}
