use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" while a score store answers, "degraded" otherwise.
    pub status: String,
    /// Matches currently loaded with a live sync session.
    pub loaded_matches: usize,
}

impl HealthResponse {
    pub fn new(degraded: bool, loaded_matches: usize) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            loaded_matches,
        }
    }
}
