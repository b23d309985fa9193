use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::MatchStatus, scoring::MatchTotals, sync::SyncPhase};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a match moves along its lifecycle.
pub struct MatchStatusEvent {
    pub match_id: Uuid,
    pub status: MatchStatus,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after every accepted score entry.
pub struct ScoresChangedEvent {
    pub match_id: Uuid,
    pub totals: MatchTotals,
    /// Cells still missing before the match can be finalized.
    pub missing: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the save indicator of a loaded match changes.
pub struct SyncPhaseChangedEvent {
    pub match_id: Uuid,
    pub phase: SyncPhase,
}
