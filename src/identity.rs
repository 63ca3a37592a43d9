//! Accounts, sessions and roles.
use anyhow::Context as _;
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _, password_hash::SaltString};
use axum::http::StatusCode;
use chrono::Utc;
use rand::{Rng as _, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    Error, Result,
    db::{Db, Filter},
    metrics::AUTH_FAILED,
    models::User,
    validation,
};

/// Role that unlocks the moderation and content management operations.
pub const ADMIN_ROLE: &str = "Admin";
/// Name of the account created on first startup.
pub const BOOTSTRAP_ADMIN: &str = "admin";

#[derive(Deserialize, Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Session {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub user: User,
    pub is_admin: bool,
}

fn normalize(username: &str) -> String {
    username.to_uppercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), salt.as_salt())
        .context("failed to hash password")?
        .to_string();
    Ok(hash)
}

/// Create an account. Usernames are unique ignoring case.
pub async fn register(db: &Db, creds: &Credentials) -> Result<User> {
    validation::username(&creds.username)?;
    validation::password(&creds.password)?;

    let mut user = User {
        id: 0,
        username: creds.username.clone(),
        normalized_username: normalize(&creds.username),
        password_hash: hash_password(&creds.password)?,
        is_banned: false,
        created_at: Utc::now(),
    };
    _ = db.insert(&mut user).await?;

    info!(user = user.id, "registered {}", user.username);
    Ok(user)
}

/// Check credentials and open a new session.
pub async fn login(db: &Db, creds: &Credentials) -> Result<Session> {
    let user: Option<User> = db
        .get_one(Filter::eq("normalized_username", normalize(&creds.username)))
        .await?;

    let Some(user) = user else {
        metrics::counter!(AUTH_FAILED).increment(1);
        return Err(Error::unauthorized("failed to validate credentials"));
    };

    let hash = PasswordHash::new(&user.password_hash).context("invalid password hash in db")?;
    if Argon2::default()
        .verify_password(creds.password.as_bytes(), &hash)
        .is_err()
    {
        metrics::counter!(AUTH_FAILED).increment(1);
        warn!(user = user.id, "failed login attempt");
        return Err(Error::unauthorized("failed to validate credentials"));
    }

    let expired = db.delete_expired_sessions().await?;
    if expired > 0 {
        debug!(expired, "pruned expired sessions");
    }

    let token = Uuid::new_v4().to_string();
    db.create_session(&token, user.id).await?;
    let is_admin = db.has_role(user.id, ADMIN_ROLE).await?;

    Ok(Session {
        token,
        user,
        is_admin,
    })
}

/// End the session `token`. Ending a session that does not exist is not an error.
pub async fn logout(db: &Db, token: &str) -> Result<()> {
    if db.delete_session(token).await? {
        info!("session ended");
    }
    Ok(())
}

/// Create the bootstrap administrator when no account holds [`ADMIN_ROLE`].
///
/// Returns the generated password so it can be shown once.
pub async fn ensure_admin(db: &Db) -> Result<Option<(User, String)>> {
    if db.count_with_role(ADMIN_ROLE).await? > 0 {
        return Ok(None);
    }

    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect();

    let creds = Credentials {
        username: BOOTSTRAP_ADMIN.to_owned(),
        password,
    };
    let user = match register(db, &creds).await {
        Ok(user) => user,
        Err(err) if err.status() == StatusCode::CONFLICT => {
            return Err(anyhow::anyhow!(
                "no administrator exists, but the {BOOTSTRAP_ADMIN:?} account is taken"
            )
            .into());
        }
        Err(err) => return Err(err),
    };
    db.add_role(user.id, ADMIN_ROLE).await?;

    Ok(Some((user, creds.password)))
}
