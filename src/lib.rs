//! Mediaful: a watch-tracking service.
//!
//! Users log the movies and shows they watch, share them to a feed and browse each
//! other's collections. Administrators moderate reported posts, publish
//! announcements and rotate the featured titles.
mod auth;
mod config;
mod db;
mod endpoints;
pub mod error;
mod featured;
mod feed;
mod identity;
mod metrics;
mod models;
mod moderation;
mod serve;
mod validation;
mod watch_log;

#[cfg(test)]
mod tests;

pub use serve::{AppState, Error, Result, run};

/// The index (/) route.
async fn index() -> impl axum::response::IntoResponse {
    r"
                    _ _       __       _
  _ __ ___   ___  __| (_) __ _ / _|_   _| |
 | '_ ` _ \ / _ \/ _` | |/ _` | |_| | | | |
 | | | | | |  __/ (_| | | (_| |  _| |_| | |
 |_| |_| |_|\___|\__,_|_|\__,_|_|  \__,_|_|


This is Mediaful, a watch-tracking server.

Most API routes are under /api/
Featured images are under /images/
    "
}
