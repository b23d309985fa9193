use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::matches::{
        FinalizeResponse, ScoreEntryResponse, ScoreRequest, ScorecardResponse, ScoresResponse,
    },
    error::AppError,
    services::score_service,
    state::SharedState,
};

/// Routes for entering scores and reading or closing a match.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches/{id}/scores", get(list_scores).put(record_score))
        .route("/matches/{id}/scorecard", get(scorecard))
        .route("/matches/{id}/finalize", post(finalize))
}

/// List the scored cells of a match with their save state.
#[utoipa::path(
    get,
    path = "/matches/{id}/scores",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Scored cells", body = ScoresResponse),
        (status = 404, description = "Unknown match"),
        (status = 503, description = "Score store unavailable")
    )
)]
pub async fn list_scores(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScoresResponse>, AppError> {
    Ok(Json(score_service::list_scores(&state, id).await?))
}

/// Set or clear one gross score; persisted in the background.
#[utoipa::path(
    put,
    path = "/matches/{id}/scores",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    request_body = ScoreRequest,
    responses(
        (status = 200, description = "Score accepted locally", body = ScoreEntryResponse),
        (status = 400, description = "Hole, score or player out of range"),
        (status = 404, description = "Unknown match"),
        (status = 409, description = "Match already completed"),
        (status = 503, description = "Score store unavailable")
    )
)]
pub async fn record_score(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ScoreRequest>>,
) -> Result<Json<ScoreEntryResponse>, AppError> {
    Ok(Json(score_service::record_score(&state, id, payload).await?))
}

/// Scorecard with strokes, net scores, hole points and totals.
#[utoipa::path(
    get,
    path = "/matches/{id}/scorecard",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Derived scorecard", body = ScorecardResponse),
        (status = 404, description = "Unknown match"),
        (status = 409, description = "Roster does not field two players per side"),
        (status = 503, description = "Score store unavailable")
    )
)]
pub async fn scorecard(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScorecardResponse>, AppError> {
    Ok(Json(score_service::scorecard(&state, id).await?))
}

/// Close the match once every active player has scored every hole.
#[utoipa::path(
    post,
    path = "/matches/{id}/finalize",
    tag = "matches",
    params(("id" = Uuid, Path, description = "Match identifier")),
    responses(
        (status = 200, description = "Match completed", body = FinalizeResponse),
        (status = 409, description = "Scores missing, unsaved edits or match already completed"),
        (status = 503, description = "Score store unavailable")
    )
)]
pub async fn finalize(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FinalizeResponse>, AppError> {
    Ok(Json(score_service::finalize_match(&state, id).await?))
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use super::*;
    use crate::{
        dao::models::MatchStatus,
        services::score_service::tests::{fill_card, request, seeded_state},
    };

    #[tokio::test]
    async fn put_then_read_back_the_scorecard() {
        let (state, _store, match_id, players) = seeded_state().await;

        let Json(entry) = record_score(
            State(state.clone()),
            Path(match_id),
            Valid(Json(request(players[3], 4, Some(7)))),
        )
        .await
        .unwrap();
        assert_eq!(entry.status, MatchStatus::InProgress);

        let Json(card) = scorecard(State(state.clone()), Path(match_id)).await.unwrap();
        let line = card
            .scorecard
            .players
            .iter()
            .find(|line| line.player_id == players[3])
            .unwrap();
        assert_eq!(line.holes[3].gross, Some(7));
        assert!(!card.generated_at.is_empty());
    }

    #[tokio::test]
    async fn finalize_early_answers_conflict_with_missing_cells() {
        let (state, _store, match_id, _players) = seeded_state().await;

        let response = finalize(State(state), Path(match_id))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn finalize_full_card() {
        let (state, _store, match_id, players) = seeded_state().await;
        fill_card(&state, match_id, players).await;

        let Json(done) = finalize(State(state.clone()), Path(match_id)).await.unwrap();
        assert_eq!(done.status, MatchStatus::Completed);

        let response = finalize(State(state), Path(match_id))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_match_is_404() {
        let (state, _store, _match_id, _players) = seeded_state().await;
        let response = list_scores(State(state), Path(Uuid::new_v4()))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
