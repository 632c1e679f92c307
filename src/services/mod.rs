/// OpenAPI documentation generation.
pub mod documentation;
/// Typed fan-out of domain events to session and user rooms.
pub mod fanout_events;
/// Health check service.
pub mod health_service;
/// Session lifecycle transitions (the single writer of status/phase/index).
pub mod lifecycle_service;
/// Participant admission, identity, and seat management.
pub mod participant_service;
/// Score locking, aggregation, and reveal-gated results.
pub mod score_service;
/// Session bootstrap and read-model assembly.
pub mod session_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor with degraded-mode handling.
pub mod storage_supervisor;

#[cfg(test)]
pub(crate) mod testing;
