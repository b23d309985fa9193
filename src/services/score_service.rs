use std::sync::{Arc, Weak};

use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        matches::{
            FinalizeResponse, ScoreCell, ScoreEntryResponse, ScoreRequest, ScorecardResponse,
            ScoresResponse,
        },
        now_rfc3339,
    },
    dao::models::ScoreWrite,
    error::ServiceError,
    scoring::Hole,
    services::sse_events,
    state::{
        AppState, MatchSession, SharedState, state_machine::MatchEvent,
        transitions::run_transition_with_broadcast,
    },
    sync::{CellSyncState, ScoreSyncController},
};

/// Sync session of a match, loading it from the store on first use.
pub async fn session(
    state: &SharedState,
    match_id: Uuid,
) -> Result<ScoreSyncController, ServiceError> {
    if let Some(controller) = state.session(match_id) {
        return Ok(controller);
    }

    let store = state.require_store().await?;
    let controller =
        ScoreSyncController::load(store, match_id, state.config().sync_policy()).await?;
    let tasks = vec![
        controller.spawn_watch(),
        spawn_sync_forwarder(Arc::downgrade(state), &controller),
    ];
    let controller = state.install_session(match_id, MatchSession::new(controller, tasks));
    state.observe_status(match_id, controller.status().await);
    info!(%match_id, "match session opened");

    Ok(controller)
}

/// Relay a session's cell notices, save indicator and refreshed totals onto
/// the SSE hub.
fn spawn_sync_forwarder(
    state: Weak<AppState>,
    controller: &ScoreSyncController,
) -> JoinHandle<()> {
    let match_id = controller.match_id();
    let mut notices = controller.subscribe_notices();
    let mut phase = controller.subscribe_phase();
    let mut refreshes = controller.subscribe_refreshes();

    tokio::spawn(async move {
        let mut watch_phase = true;
        let mut watch_refreshes = true;
        loop {
            tokio::select! {
                notice = notices.recv() => match notice {
                    Ok(notice) => {
                        let Some(state) = state.upgrade() else { break };
                        sse_events::broadcast_sync_notice(&state, &notice);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%match_id, skipped, "sync notices lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = phase.changed(), if watch_phase => {
                    if changed.is_err() {
                        watch_phase = false;
                        continue;
                    }
                    let current = *phase.borrow_and_update();
                    let Some(state) = state.upgrade() else { break };
                    sse_events::broadcast_sync_phase(&state, match_id, current);
                }
                changed = refreshes.changed(), if watch_refreshes => {
                    if changed.is_err() {
                        watch_refreshes = false;
                        continue;
                    }
                    let scorecard = refreshes.borrow_and_update().clone();
                    let Some(state) = state.upgrade() else { break };
                    sse_events::broadcast_scores_changed(&state, match_id, &scorecard);
                }
            }
        }
    })
}

/// Enter or clear one gross score and return the optimistic scorecard.
///
/// The write is persisted in the background; its outcome is published as
/// `score.sync` events.
pub async fn record_score(
    state: &SharedState,
    match_id: Uuid,
    request: ScoreRequest,
) -> Result<ScoreEntryResponse, ServiceError> {
    let hole = Hole::new(request.hole).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let controller = session(state, match_id).await?;
    let before = controller.status().await;
    state.observe_status(match_id, before);

    let (entry, next) = state
        .run_transition(match_id, MatchEvent::ScoreRecorded, || async {
            controller
                .enter_score(request.player_id, hole, request.score)
                .await
                .map_err(ServiceError::from)
        })
        .await?;

    if next != before {
        sse_events::broadcast_match_status(state, match_id, next);
    }
    sse_events::broadcast_scores_changed(state, match_id, &entry.scorecard);

    let sync = match entry.persist {
        Some(_) => CellSyncState::Pending,
        None => controller
            .cell_state(request.player_id, hole)
            .await
            .unwrap_or(CellSyncState::Saved),
    };

    Ok(ScoreEntryResponse {
        match_id,
        player_id: request.player_id,
        hole,
        score: request.score,
        sync,
        status: next,
        scorecard: entry.scorecard,
    })
}

/// Enter again the scores a replaced store never confirmed.
///
/// Cells whose value already matches the new store produce no write.
pub async fn replay_edits(state: &SharedState, edits: Vec<ScoreWrite>) {
    for write in edits {
        let request = ScoreRequest {
            player_id: write.player_id,
            hole: write.hole.number(),
            score: write.score,
        };
        match record_score(state, write.match_id, request).await {
            Ok(entry) => debug!(
                match_id = %write.match_id,
                player_id = %write.player_id,
                hole = %write.hole,
                sync = ?entry.sync,
                "unsaved score entered again"
            ),
            Err(err) => warn!(
                match_id = %write.match_id,
                player_id = %write.player_id,
                hole = %write.hole,
                error = %err,
                "unsaved score could not be entered again"
            ),
        }
    }
}

/// Raw scored cells of a match with their persistence state.
pub async fn list_scores(
    state: &SharedState,
    match_id: Uuid,
) -> Result<ScoresResponse, ServiceError> {
    let controller = session(state, match_id).await?;

    let mut scores = Vec::new();
    for score in controller.scores().await {
        let sync = controller.cell_state(score.player_id, score.hole).await;
        scores.push(ScoreCell::new(score, sync));
    }

    Ok(ScoresResponse {
        match_id,
        status: controller.status().await,
        phase: controller.phase(),
        scores,
    })
}

/// Derived scorecard of a match.
pub async fn scorecard(
    state: &SharedState,
    match_id: Uuid,
) -> Result<ScorecardResponse, ServiceError> {
    let controller = session(state, match_id).await?;
    let scorecard = controller.scorecard().await?;

    Ok(ScorecardResponse {
        match_id,
        status: controller.status().await,
        phase: controller.phase(),
        scorecard,
        generated_at: now_rfc3339(),
    })
}

/// Close a match once every active player has a score on every hole.
pub async fn finalize_match(
    state: &SharedState,
    match_id: Uuid,
) -> Result<FinalizeResponse, ServiceError> {
    let controller = session(state, match_id).await?;
    state.observe_status(match_id, controller.status().await);

    let missing = controller.missing().await;
    if !missing.is_empty() {
        return Err(ServiceError::Incomplete(missing));
    }

    let totals = run_transition_with_broadcast(state, match_id, MatchEvent::Finalize, || async {
        controller.finalize().await.map_err(ServiceError::from)
    })
    .await?;

    Ok(FinalizeResponse {
        match_id,
        status: controller.status().await,
        totals,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::MatchStatus,
            score_store::{ScoreStore, memory::{MemoryScoreStore, tests::seeded_store}},
        },
        scoring::Points,
        sync::{
            SyncPolicy,
            controller::tests::{ScriptedStore, transient},
        },
    };

    pub(crate) fn fast_policy() -> SyncPolicy {
        SyncPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(10),
            request_timeout: Duration::from_secs(1),
            poll_interval_min: Duration::from_millis(50),
            poll_interval_max: Duration::from_millis(80),
            saved_linger: Duration::from_millis(20),
        }
    }

    pub(crate) async fn seeded_state() -> (SharedState, MemoryScoreStore, Uuid, [Uuid; 4]) {
        let (store, match_id, players) = seeded_store();
        let state = AppState::new(AppConfig::default().with_sync_policy(fast_policy()));
        state.set_score_store(Arc::new(store.clone())).await;
        (state, store, match_id, players)
    }

    pub(crate) fn request(player_id: Uuid, hole: u8, score: Option<u8>) -> ScoreRequest {
        ScoreRequest {
            player_id,
            hole,
            score,
        }
    }

    pub(crate) async fn wait_saved(state: &SharedState, match_id: Uuid, player_id: Uuid, hole: u8) {
        let controller = state.session(match_id).expect("session loaded");
        let hole = Hole::new(hole).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while controller.cell_state(player_id, hole).await != Some(CellSyncState::Saved) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("cell saved in time");
    }

    /// Score every hole for every player, home players one stroke better.
    pub(crate) async fn fill_card(state: &SharedState, match_id: Uuid, players: [Uuid; 4]) {
        for hole in 1..=9u8 {
            for (idx, player) in players.iter().enumerate() {
                let score = if idx < 2 { 4 } else { 5 };
                record_score(state, match_id, request(*player, hole, Some(score)))
                    .await
                    .unwrap();
            }
        }
        for hole in 1..=9u8 {
            for player in players {
                wait_saved(state, match_id, player, hole).await;
            }
        }
    }

    #[tokio::test]
    async fn first_score_starts_the_match() {
        let (state, store, match_id, players) = seeded_state().await;
        let mut events = state.sse().subscribe();

        let response = record_score(&state, match_id, request(players[0], 1, Some(4)))
            .await
            .unwrap();
        assert_eq!(response.status, MatchStatus::InProgress);
        assert_eq!(response.sync, CellSyncState::Pending);
        assert_eq!(response.scorecard.missing.len(), 35);

        // Session relays (`score.*`) interleave freely with the request's own events.
        let mut names = Vec::new();
        while names.len() < 2 {
            let event = events.recv().await.unwrap();
            match event.event.as_deref() {
                Some(name) if !name.starts_with("score.") => names.push(name.to_string()),
                _ => continue,
            }
        }
        assert_eq!(names, ["match.status", "scores.changed"]);

        wait_saved(&state, match_id, players[0], 1).await;
        let stored = store.fetch_scores(match_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].score, Some(4));
    }

    #[tokio::test]
    async fn repeated_entry_is_reported_saved() {
        let (state, _store, match_id, players) = seeded_state().await;

        record_score(&state, match_id, request(players[1], 2, Some(3)))
            .await
            .unwrap();
        wait_saved(&state, match_id, players[1], 2).await;

        let again = record_score(&state, match_id, request(players[1], 2, Some(3)))
            .await
            .unwrap();
        assert_eq!(again.sync, CellSyncState::Saved);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let (state, _store, _match_id, players) = seeded_state().await;
        let err = record_score(&state, Uuid::new_v4(), request(players[0], 1, Some(4)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_player_is_invalid_input() {
        let (state, _store, match_id, _players) = seeded_state().await;
        let err = record_score(&state, match_id, request(Uuid::new_v4(), 1, Some(4)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn degraded_mode_refuses_work() {
        let state = AppState::new(AppConfig::default());
        let err = scorecard(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn list_scores_reports_sync_state() {
        let (state, _store, match_id, players) = seeded_state().await;
        record_score(&state, match_id, request(players[2], 7, Some(6)))
            .await
            .unwrap();
        wait_saved(&state, match_id, players[2], 7).await;

        let listed = list_scores(&state, match_id).await.unwrap();
        assert_eq!(listed.scores.len(), 1);
        assert_eq!(listed.scores[0].sync, Some(CellSyncState::Saved));
    }

    #[tokio::test]
    async fn incomplete_card_cannot_be_finalized() {
        let (state, _store, match_id, players) = seeded_state().await;
        record_score(&state, match_id, request(players[0], 1, Some(4)))
            .await
            .unwrap();

        match finalize_match(&state, match_id).await {
            Err(ServiceError::Incomplete(missing)) => assert_eq!(missing.len(), 35),
            other => panic!("expected incomplete, got {other:?}"),
        }
        assert_eq!(
            state.lifecycle(match_id).unwrap().status,
            MatchStatus::InProgress
        );
    }

    #[tokio::test]
    async fn complete_card_finalizes_and_freezes() {
        let (state, store, match_id, players) = seeded_state().await;
        fill_card(&state, match_id, players).await;

        let finalized = finalize_match(&state, match_id).await.unwrap();
        assert_eq!(finalized.status, MatchStatus::Completed);
        assert_eq!(
            finalized.totals.home + finalized.totals.away,
            Points::from_halves(18)
        );
        assert_eq!(
            store.fetch_match_status(match_id).await.unwrap(),
            MatchStatus::Completed
        );

        let err = record_score(&state, match_id, request(players[0], 1, Some(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn refreshed_scores_reach_the_stream() {
        let (state, store, match_id, players) = seeded_state().await;
        list_scores(&state, match_id).await.unwrap();
        let mut events = state.sse().subscribe();

        // Another device scores a cell.
        store
            .write_score(ScoreWrite {
                match_id,
                player_id: players[3],
                hole: Hole::new(6).unwrap(),
                score: Some(5),
            })
            .await
            .unwrap();

        let payload = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.event.as_deref() == Some("scores.changed") {
                    break event.data;
                }
            }
        })
        .await
        .expect("scores.changed relayed in time");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["missing"], 35);
    }

    #[tokio::test]
    async fn unsaved_scores_survive_a_store_swap() {
        let (memory, match_id, players) = seeded_store();
        let flaky = ScriptedStore::new(memory.clone());
        for _ in 0..3 {
            flaky.fail_next(transient());
        }
        let state = AppState::new(AppConfig::default().with_sync_policy(fast_policy()));
        state.set_score_store(flaky).await;

        record_score(&state, match_id, request(players[1], 2, Some(4)))
            .await
            .unwrap();
        let controller = state.session(match_id).expect("session loaded");
        let hole = Hole::new(2).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while controller.cell_state(players[1], hole).await != Some(CellSyncState::Failed) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("write failed in time");

        let unsaved = state.set_score_store(Arc::new(memory.clone())).await;
        assert_eq!(unsaved.len(), 1);
        replay_edits(&state, unsaved).await;

        wait_saved(&state, match_id, players[1], 2).await;
        let grid: crate::scoring::ScoreGrid =
            memory.fetch_scores(match_id).await.unwrap().into_iter().collect();
        assert_eq!(grid.get(players[1], hole), Some(4));
    }

    #[tokio::test]
    async fn new_store_drops_loaded_sessions() {
        let (state, _store, match_id, _players) = seeded_state().await;
        scorecard(&state, match_id).await.unwrap();
        assert_eq!(state.loaded_matches(), 1);

        state
            .set_score_store(Arc::new(MemoryScoreStore::new()))
            .await;
        assert_eq!(state.loaded_matches(), 0);
    }
}
