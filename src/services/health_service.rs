use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report degraded mode and the number of loaded matches, logging store trouble.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "score store health check failed");
            }
        }
        Err(_) => warn!("score store unavailable (degraded mode)"),
    }

    HealthResponse::new(state.is_degraded().await, state.loaded_matches())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::score_store::memory::MemoryScoreStore, state::AppState,
    };

    #[tokio::test]
    async fn degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");

        state.set_score_store(Arc::new(MemoryScoreStore::new())).await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.loaded_matches, 0);
    }
}
