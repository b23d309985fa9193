use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the golf league scoring backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::match_stream,
        crate::routes::matches::list_scores,
        crate::routes::matches::record_score,
        crate::routes::matches::scorecard,
        crate::routes::matches::finalize,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::matches::ScoreRequest,
            crate::dto::matches::ScoreEntryResponse,
            crate::dto::matches::ScoresResponse,
            crate::dto::matches::ScoreCell,
            crate::dto::matches::ScorecardResponse,
            crate::dto::matches::FinalizeResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::MatchStatusEvent,
            crate::dto::sse::ScoresChangedEvent,
            crate::dto::sse::SyncPhaseChangedEvent,
            crate::dao::models::MatchStatus,
            crate::scoring::MissingScore,
            crate::scoring::MatchTotals,
            crate::sync::CellSyncState,
            crate::sync::SyncPhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "matches", description = "Score entry, scorecards and finalization"),
    )
)]
pub struct ApiDoc;
