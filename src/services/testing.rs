//! Shared fixtures for service tests, running against the in-memory store.

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{models::SessionTheme, session_store::memory::MemorySessionStore},
    dto::session::{CreateSessionRequest, WhiskeyInput},
    state::{AppState, SharedState},
};

pub(crate) async fn test_state() -> SharedState {
    let state = AppState::new(AppConfig::default());
    state
        .install_store(Arc::new(MemorySessionStore::new()))
        .await;
    state
}

pub(crate) fn whiskey_input(name: &str) -> WhiskeyInput {
    WhiskeyInput {
        name: name.to_string(),
        distillery: "Willett".to_string(),
        age_years: Some(8),
        proof: 110.0,
        price: Some(89.99),
        mashbill: None,
        region: Some("Kentucky".to_string()),
        pour_size_ml: None,
    }
}

pub(crate) fn create_request(whiskeys: Vec<WhiskeyInput>) -> CreateSessionRequest {
    CreateSessionRequest {
        name: "Friday blind flight".to_string(),
        theme: SessionTheme::Bourbon,
        custom_theme: None,
        proof_range: None,
        scheduled_for: None,
        max_participants: None,
        draft: false,
        moderator_name: "Host".to_string(),
        whiskeys,
    }
}
