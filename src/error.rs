use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the cafe24-events service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // ── Storage ─────────────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    // ── Platform (Cafe24 admin API) ─────────────────────────────────────
    #[error("Platform request failed: {0}")]
    Upstream(String),

    #[error("Platform returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    // ── Token refresh ───────────────────────────────────────────────────
    /// The OAuth endpoint rejected the refresh token (`invalid_grant`).
    /// Terminal until someone re-authorizes the app out of band.
    #[error("Refresh token rejected; manual re-authorization required")]
    RefreshRejected,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("No credentials available: {0}")]
    MissingCredentials(String),

    // ── Request plumbing ────────────────────────────────────────────────
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<mongodb::error::Error> for ApiError {
    fn from(e: mongodb::error::Error) -> Self {
        tracing::error!("MongoDB error: {e}");
        ApiError::Storage(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "platform_unreachable"),
            ApiError::UpstreamStatus { .. } => (StatusCode::BAD_GATEWAY, "platform_error"),
            ApiError::RefreshRejected => (StatusCode::BAD_GATEWAY, "refresh_rejected"),
            ApiError::RefreshFailed(_) => (StatusCode::BAD_GATEWAY, "refresh_failed"),
            ApiError::MissingCredentials(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "missing_credentials")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_rejected_is_distinct_from_transient_refresh_failures() {
        let rejected = ApiError::RefreshRejected;
        let transient = ApiError::RefreshFailed("connection reset".into());
        assert!(!matches!(transient, ApiError::RefreshRejected));
        assert!(rejected.to_string().contains("re-authorization"));
    }

    #[test]
    fn duplicate_entry_maps_to_conflict() {
        let resp = ApiError::Conflict("already entered".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
