use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::MatchStatus,
    dto::sse::{
        MatchStatusEvent, ScoresChangedEvent, ServerEvent, SyncPhaseChangedEvent, SystemStatus,
    },
    scoring::Scorecard,
    state::SharedState,
    sync::{SyncNotice, SyncPhase},
};

pub const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_MATCH_STATUS: &str = "match.status";
const EVENT_SCORES_CHANGED: &str = "scores.changed";
const EVENT_SCORE_SYNC: &str = "score.sync";
const EVENT_SYNC_PHASE: &str = "score.phase";
pub const EVENT_SYSTEM_STATUS: &str = "system.status";

/// Broadcast a match lifecycle change.
pub fn broadcast_match_status(state: &SharedState, match_id: Uuid, status: MatchStatus) {
    let payload = MatchStatusEvent { match_id, status };
    send_event(state, EVENT_MATCH_STATUS, &payload);
}

/// Broadcast the recomputed totals after a score entry or a refresh that changed the grid.
pub fn broadcast_scores_changed(state: &SharedState, match_id: Uuid, scorecard: &Scorecard) {
    let payload = ScoresChangedEvent {
        match_id,
        totals: scorecard.totals,
        missing: scorecard.missing.len(),
    };
    send_event(state, EVENT_SCORES_CHANGED, &payload);
}

/// Relay per-cell persistence feedback from a sync session.
pub fn broadcast_sync_notice(state: &SharedState, notice: &SyncNotice) {
    send_event(state, EVENT_SCORE_SYNC, notice);
}

/// Relay save indicator changes of a sync session.
pub fn broadcast_sync_phase(state: &SharedState, match_id: Uuid, phase: SyncPhase) {
    let payload = SyncPhaseChangedEvent { match_id, phase };
    send_event(state, EVENT_SYNC_PHASE, &payload);
}

/// Build the degraded-mode event, sent to streams as the flag flips.
pub fn system_status_event(degraded: bool) -> Option<ServerEvent> {
    match ServerEvent::json(
        Some(EVENT_SYSTEM_STATUS.to_string()),
        &SystemStatus { degraded },
    ) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize system status payload");
            None
        }
    }
}

fn send_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, scoring::Hole, state::AppState, sync::SyncNoticeKind};

    #[tokio::test]
    async fn events_carry_their_name_and_json_payload() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.sse().subscribe();
        let match_id = Uuid::new_v4();

        broadcast_match_status(&state, match_id, MatchStatus::Completed);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("match.status"));
        let value: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(value["status"], "COMPLETED");
        assert_eq!(value["match_id"], match_id.to_string());
    }

    #[tokio::test]
    async fn sync_notices_are_flattened() {
        let state = AppState::new(AppConfig::default());
        let mut rx = state.sse().subscribe();

        let notice = SyncNotice {
            match_id: Uuid::new_v4(),
            player_id: Uuid::new_v4(),
            hole: Hole::new(3).unwrap(),
            kind: SyncNoticeKind::WillRetry { attempt: 2 },
        };
        broadcast_sync_notice(&state, &notice);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("score.sync"));
        let value: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(value["notice"], "will_retry");
        assert_eq!(value["attempt"], 2);
        assert_eq!(value["hole"], 3);
    }

    #[test]
    fn system_status_reports_the_flag() {
        let event = system_status_event(true).unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_SYSTEM_STATUS));
        assert_eq!(event.data, r#"{"degraded":true}"#);
    }
}
