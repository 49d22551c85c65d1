use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Pool service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("cluster or host not found")]
    NotFound,
    #[error("host at capacity")]
    CapacityExceeded,
    #[error("container backend unreachable")]
    BackendUnreachable,
    #[error("backend composition failed to start")]
    BackendStartFailed,
    #[error("no available resource")]
    LeaseConflict,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Insert into `released` failed. Never returned to a caller — `delete`
    /// completes regardless — but named so the log line at the call site
    /// carries a stable `kind`.
    #[error("failed to archive cluster")]
    ArchiveFailure,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl PoolError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::BackendUnreachable => "BACKEND_UNREACHABLE",
            Self::BackendStartFailed => "BACKEND_START_FAILED",
            Self::LeaseConflict => "LEASE_CONFLICT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::ArchiveFailure => "ARCHIVE_FAILURE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for PoolError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::CapacityExceeded => StatusCode::CONFLICT,
            Self::BackendUnreachable | Self::BackendStartFailed => StatusCode::BAD_GATEWAY,
            Self::LeaseConflict => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::ArchiveFailure => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // tower_http's TraceLayer already logs method/uri/status for every request;
        // only the 500 path needs the anyhow chain logged here to keep the root
        // cause traceable (ArchiveFailure and backend cleanup errors are logged at
        // their own call sites instead, since they never reach this boundary).
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn should_return_not_found() {
        let resp = PoolError::NotFound.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn should_return_capacity_exceeded_as_conflict() {
        let resp = PoolError::CapacityExceeded.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn should_return_lease_conflict_as_conflict() {
        let resp = PoolError::LeaseConflict.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn should_return_invalid_input_as_bad_request() {
        let resp = PoolError::InvalidInput("bad daemon url".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["message"], "invalid input: bad daemon url");
    }

    #[tokio::test]
    async fn should_return_internal_as_500() {
        let resp = PoolError::Internal(anyhow::anyhow!("db down")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
