use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Coarse classification used to pick the HTTP status of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    PermissionDenied,
    Conflict,
    Auth,
    Downstream,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Downstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Every failure a service operation can report.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Input ───────────────────────────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    // ── Authentication ──────────────────────────────────────────────────
    #[error("invalid or expired code")]
    InvalidOrExpiredCode,

    #[error("invitation required for new users")]
    InvitationRequired,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid or expired invitation")]
    InvalidOrExpiredInvitation,

    // ── Permissions ─────────────────────────────────────────────────────
    #[error("user is not the owner of this list")]
    NotListOwner,

    #[error("only list owners can do this")]
    NotOwner,

    #[error("access denied")]
    AccessDenied,

    // ── Conflicts ───────────────────────────────────────────────────────
    #[error("user already exists")]
    UserAlreadyExists,

    #[error("user is already a member of this list")]
    AlreadyMember,

    #[error("user is already invited")]
    AlreadyInvited,

    #[error("cannot remove the last owner from the list")]
    LastOwnerProtection,

    #[error("system is already set up")]
    AlreadySetup,

    #[error("{0}")]
    Conflict(String),

    // ── Lookups ─────────────────────────────────────────────────────────
    #[error("list not found or access denied")]
    NotFoundOrAccessDenied,

    #[error("invitation not found or already used")]
    NotFoundOrUsed,

    #[error("member not found")]
    MemberNotFound,

    #[error("{0} not found")]
    NotFound(&'static str),

    // ── Downstream ──────────────────────────────────────────────────────
    #[error("mail delivery failed: {0:#}")]
    Mail(anyhow::Error),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::InvalidOrExpiredCode
            | AppError::InvitationRequired
            | AppError::InvalidToken
            | AppError::InvalidOrExpiredInvitation => ErrorKind::Auth,
            AppError::NotListOwner | AppError::NotOwner | AppError::AccessDenied => {
                ErrorKind::PermissionDenied
            }
            AppError::UserAlreadyExists
            | AppError::AlreadyMember
            | AppError::AlreadyInvited
            | AppError::LastOwnerProtection
            | AppError::AlreadySetup
            | AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::NotFoundOrAccessDenied
            | AppError::NotFoundOrUsed
            | AppError::MemberNotFound
            | AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Mail(_) | AppError::Internal(_) => ErrorKind::Downstream,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(constraint) => {
                tracing::warn!(%constraint, "unique constraint violated");
                AppError::Conflict("conflicting data".into())
            }
            StoreError::Database(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "request body rejected");
        AppError::validation("invalid request body")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = match kind {
            ErrorKind::Downstream => {
                tracing::error!(error = %self, "request failed downstream");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (kind.status(), Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_fixed_statuses() {
        assert_eq!(AppError::validation("x").kind().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidOrExpiredCode.kind().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotOwner.kind().status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFoundOrAccessDenied.kind().status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::LastOwnerProtection.kind().status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).kind().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_violation_becomes_conflict_without_schema_names() {
        let err: AppError = StoreError::UniqueViolation("magic_links_pkey".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "conflicting data");
    }

    #[tokio::test]
    async fn downstream_details_are_not_leaked() {
        let resp = AppError::Internal(anyhow::anyhow!("connection refused to 10.0.0.7")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.7"));
        assert!(text.contains("internal server error"));
    }
}
