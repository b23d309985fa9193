use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::sse_events::broadcast_match_status,
    state::{SharedState, state_machine::MatchEvent},
};

/// Run a lifecycle transition for a match, then broadcast the resulting status.
pub async fn run_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    match_id: Uuid,
    event: MatchEvent,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let (res, next) = state.run_transition(match_id, event, work).await?;
    broadcast_match_status(state, match_id, next);
    Ok(res)
}
