use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the backend's health. A failing storage ping is logged but does not
/// flip the response to degraded on its own; the supervisor clears the store
/// once it confirms the backend is gone.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Some(store) = state.store().await else {
        warn!("healthcheck while degraded: no storage backend installed");
        return HealthResponse::degraded();
    };

    if let Err(err) = store.health_check().await {
        warn!(error = %err, "storage ping failed during healthcheck");
    }

    HealthResponse::ok()
}
