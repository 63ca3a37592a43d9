use axum::Router;

use crate::AppState;

mod account;
mod admin;
mod collection;
mod community;
mod feed;

/// Every JSON route, to be nested under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(account::routes())
        .merge(feed::routes())
        .merge(collection::routes())
        .merge(community::routes())
        .nest("/admin", admin::routes())
}
