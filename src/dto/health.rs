use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status ("ok", or "degraded" while the storage backend is away).
    pub status: String,
    /// Whether a storage backend is currently installed.
    pub storage_connected: bool,
}

impl HealthResponse {
    /// The backend and its storage connection are operational.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            storage_connected: true,
        }
    }

    /// The backend is serving without a storage connection; operations that
    /// touch storage fail until the supervisor reinstalls a backend.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            storage_connected: false,
        }
    }
}
