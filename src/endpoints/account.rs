use axum::{Json, Router, extract::State, http::StatusCode, routing::post};

use crate::{
    AppState, Result,
    auth::BearerToken,
    db::Db,
    identity::{self, Credentials, Session},
    models::User,
};

async fn create_account(
    State(db): State<Db>,
    Json(input): Json<Credentials>,
) -> Result<(StatusCode, Json<User>)> {
    let user = identity::register(&db, &input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn create_session(State(db): State<Db>, Json(input): Json<Credentials>) -> Result<Json<Session>> {
    Ok(Json(identity::login(&db, &input).await?))
}

async fn delete_session(State(db): State<Db>, BearerToken(token): BearerToken) -> Result<StatusCode> {
    identity::logout(&db, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) fn routes() -> Router<AppState> {
    // UP /api/account
    // UP /api/session
    // AD /api/session
    Router::new()
        .route("/account", post(create_account))
        .route("/session", post(create_session).delete(delete_session))
}
