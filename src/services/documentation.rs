use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Blind Dram backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::join_session,
        crate::routes::session::get_session,
        crate::routes::session::delete_session,
        crate::routes::session::add_whiskey,
        crate::routes::session::open_session,
        crate::routes::session::start_session,
        crate::routes::session::advance_session,
        crate::routes::session::pause_session,
        crate::routes::session::resume_session,
        crate::routes::session::reveal_session,
        crate::routes::session::end_session,
        crate::routes::score::submit_score,
        crate::routes::score::session_results,
        crate::routes::score::set_score_visibility,
        crate::routes::participant::mark_ready,
        crate::routes::participant::update_participant_status,
        crate::routes::participant::leave_session,
        crate::routes::sse::session_stream,
        crate::routes::sse::user_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::CreateSessionResponse,
            crate::dto::session::ProofRangeInput,
            crate::dto::session::WhiskeyInput,
            crate::dto::session::AdvanceRequest,
            crate::dto::session::WhiskeyIdentity,
            crate::dto::session::WhiskeySummary,
            crate::dto::session::SessionSummary,
            crate::dto::participant::JoinSessionRequest,
            crate::dto::participant::JoinSessionResponse,
            crate::dto::participant::ParticipantSummary,
            crate::dto::participant::UpdateParticipantStatusRequest,
            crate::dto::score::SubmitScoreRequest,
            crate::dto::score::ScoreReceipt,
            crate::dto::score::ScoreSummary,
            crate::dto::score::ScoreAverages,
            crate::dto::score::WhiskeyResults,
            crate::dto::score::SessionResults,
            crate::dto::score::SetScoreVisibilityRequest,
            crate::dto::events::Handshake,
            crate::dto::events::PhasePayload,
            crate::dto::events::StatusPayload,
            crate::dto::events::ParticipantPayload,
            crate::dto::events::ParticipantStatusPayload,
            crate::dto::events::ScoreLockedPayload,
            crate::dao::models::SessionTheme,
            crate::dao::models::ProofRange,
            crate::dao::models::ParticipantStatus,
            crate::state::lifecycle::SessionStatus,
            crate::state::lifecycle::TastingPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session bootstrap and lifecycle transitions"),
        (name = "scores", description = "Score locking and revealed results"),
        (name = "participants", description = "Seat readiness, status, and leaving"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
