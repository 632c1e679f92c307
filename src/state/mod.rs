pub mod fanout;
pub mod lifecycle;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{config::AppConfig, dao::session_store::SessionStore, error::ServiceError};

pub use self::fanout::{FanoutHub, RoomId};
pub use self::lifecycle::{Lifecycle, LifecycleEvent, SessionStatus, TastingPhase};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Per-room broadcast buffer size for the fan-out hub.
const FANOUT_CAPACITY: usize = 32;

/// Central application state holding the storage handle, the fan-out hub,
/// and the per-session transition gates.
pub struct AppState {
    store: RwLock<Option<Arc<dyn SessionStore>>>,
    fanout: FanoutHub,
    config: AppConfig,
    session_gates: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            store: RwLock::new(None),
            fanout: FanoutHub::new(FANOUT_CAPACITY),
            config,
            session_gates: DashMap::new(),
        })
    }

    /// Obtain a handle to the current session store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the session store or fail with a degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn SessionStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn SessionStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_store(&self) {
        let mut guard = self.store.write().await;
        guard.take();
    }

    /// Whether the backend is currently serving without a storage backend.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Hub fanning domain events out to session and user rooms.
    pub fn fanout(&self) -> &FanoutHub {
        &self.fanout
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Advisory lock serializing lifecycle transitions for one session.
    /// Every transition holds this gate across its load/compute/persist
    /// round trip so concurrent moderator calls cannot interleave.
    pub fn session_gate(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        self.session_gates
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
