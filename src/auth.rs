//! Authentication layers
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;

use crate::{AppState, Error, identity::ADMIN_ROLE};

/// The user a request was made on behalf of.
#[derive(Serialize, Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    pub is_banned: bool,
    pub is_admin: bool,
}

/// The raw bearer token of a request.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// An [`AuthenticatedUser`] holding the administrator role.
#[derive(Debug, Clone)]
pub struct Admin(pub AuthenticatedUser);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn resolve(token: &str, state: &AppState) -> Result<AuthenticatedUser, Error> {
    let user = state
        .db
        .get_session_user(token)
        .await?
        .ok_or_else(|| Error::unauthorized("invalid session"))?;
    let is_admin = state.db.has_role(user.id, ADMIN_ROLE).await?;

    Ok(AuthenticatedUser {
        id: user.id,
        username: user.username,
        is_banned: user.is_banned,
        is_admin,
    })
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| Error::unauthorized("no bearer token provided"))?;
        resolve(token, state).await
    }
}

/// Anonymous requests are let through as `None`. A token that is present but
/// invalid is still rejected.
impl OptionalFromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) => resolve(token, state).await.map(Some),
            None => Ok(None),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(parts)
            .map(|token| Self(token.to_owned()))
            .ok_or_else(|| Error::unauthorized("no bearer token provided"))
    }
}

impl FromRequestParts<AppState> for Admin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = <AuthenticatedUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(Error::forbidden("administrator role required"));
        }
        Ok(Self(user))
    }
}
