//! Domain error taxonomy shared by all services.
//!
//! Every non-success path carries a single descriptive message. Store I/O
//! failures are the only retryable kind and are kept distinct from the
//! deterministic domain-rule violations.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input; multiple violations are joined into one message.
    #[error("{0}")]
    Validation(String),

    /// Unknown user or role.
    #[error("{0}")]
    NotFound(String),

    /// Role already held, role missing for removal, same password resupplied,
    /// user exists already.
    #[error("{0}")]
    Conflict(String),

    /// Protected-administrator rule violated or insufficient authorization.
    #[error("{0}")]
    Forbidden(String),

    /// Bad credentials, locked account, breached password.
    #[error("{0}")]
    Unauthorized(String),

    /// Transient store failure; retryable, unlike every other kind.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Unexpected internal failure (e.g. the hashing capability).
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl DomainError {
    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Do not leak internals to the caller.
            Self::Store(_) | Self::Internal(_) => "Service unavailable".to_string(),
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            DomainError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DomainError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DomainError::Conflict("dup".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DomainError::Forbidden("no".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            DomainError::Unauthorized("who".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            DomainError::internal(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_pass_through_for_domain_kinds() {
        let err = DomainError::Conflict("User exist!".into());
        assert_eq!(err.to_string(), "User exist!");
    }
}
