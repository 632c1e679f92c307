use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{session_store::SessionStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Keep the shared state supplied with a storage backend: connect with
/// exponential backoff, poll the connection's health, and drop back into
/// degraded mode when the backend goes away. The HTTP surface keeps serving
/// throughout; only storage-touching operations fail while degraded.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SessionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!(attempt, "storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;
                attempt = 0;

                loop {
                    sleep(HEALTH_POLL_INTERVAL).await;
                    if let Err(err) = store.health_check().await {
                        warn!(error = %err, "storage health check failed; entering degraded mode");
                        state.clear_store().await;
                        break;
                    }
                }
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}
