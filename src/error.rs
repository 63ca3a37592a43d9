use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::{db::StoreError, validation::ValidationError};

/// `axum`-compatible error handler.
#[derive(Error)]
pub struct Error {
    status: StatusCode,
    err: anyhow::Error,
}

impl Error {
    pub fn with_status(status: StatusCode, err: impl Into<anyhow::Error>) -> Self {
        Self {
            status,
            err: err.into(),
        }
    }

    pub fn unauthorized(msg: &'static str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, anyhow::anyhow!(msg))
    }

    pub fn forbidden(msg: &'static str) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, anyhow::anyhow!(msg))
    }

    pub fn bad_request(msg: &'static str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(msg))
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            err,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::Missing { .. } => StatusCode::NOT_FOUND,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::with_status(status, err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.status, self.err)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.err.fmt(f)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{:?}", self.err);
        } else {
            warn!(status = %self.status, "{:#}", self.err);
        }

        // N.B: Server error details only leave the process in debug builds. Client
        // errors always carry their message.
        let body = if cfg!(debug_assertions) {
            Body::new(format!("{:?}", self.err))
        } else if self.status.is_client_error() {
            Body::new(format!("{:#}", self.err))
        } else {
            Body::empty()
        };

        (self.status, body).into_response()
    }
}
