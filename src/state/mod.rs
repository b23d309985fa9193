mod sessions;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        models::{MatchStatus, ScoreWrite},
        score_store::ScoreStore,
    },
    error::ServiceError,
    sync::ScoreSyncController,
};

pub use self::sessions::MatchSession;
pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::state_machine::{MatchEvent, MatchStateMachine};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);
const SSE_CAPACITY: usize = 64;

/// Central application state: storage handle, loaded matches, lifecycles and the SSE hub.
pub struct AppState {
    score_store: RwLock<Option<Arc<dyn ScoreStore>>>,
    sse: SseHub,
    sessions: DashMap<Uuid, MatchSession>,
    lifecycles: DashMap<Uuid, MatchStateMachine>,
    degraded: watch::Sender<bool>,
    transition_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    transition_timeout: Option<Duration>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_timeout(config, Some(DEFAULT_TRANSITION_TIMEOUT))
    }

    /// Same as [`AppState::new`] with a custom limit on transition work.
    pub fn with_timeout(config: AppConfig, transition_timeout: Option<Duration>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            score_store: RwLock::new(None),
            sse: SseHub::new(SSE_CAPACITY),
            sessions: DashMap::new(),
            lifecycles: DashMap::new(),
            degraded: degraded_tx,
            transition_gates: DashMap::new(),
            transition_timeout,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current score store, if one is installed.
    pub async fn score_store(&self) -> Option<Arc<dyn ScoreStore>> {
        let guard = self.score_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current score store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn ScoreStore>, ServiceError> {
        self.score_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a score store and leave degraded mode.
    ///
    /// Loaded matches are dropped since their controllers point at the previous
    /// store. Their unconfirmed edits are returned so they can be entered again
    /// against the new one.
    pub async fn set_score_store(&self, store: Arc<dyn ScoreStore>) -> Vec<ScoreWrite> {
        {
            let mut guard = self.score_store.write().await;
            *guard = Some(store);
        }

        let controllers: Vec<ScoreSyncController> = self
            .sessions
            .iter()
            .map(|session| session.controller().clone())
            .collect();
        self.sessions.clear();

        let mut unconfirmed = Vec::new();
        for controller in controllers {
            unconfirmed.extend(controller.unconfirmed().await);
        }
        if !unconfirmed.is_empty() {
            warn!(count = unconfirmed.len(), "carrying unsaved scores over to the new store");
        }

        self.update_degraded(false).await;
        unconfirmed
    }

    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Broadcast hub feeding the SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    /// Sync controller of a loaded match.
    pub fn session(&self, match_id: Uuid) -> Option<ScoreSyncController> {
        self.sessions
            .get(&match_id)
            .map(|session| session.controller().clone())
    }

    /// Register a freshly loaded match. When another request won the race the
    /// existing session is kept and `session` is dropped along with its tasks.
    pub fn install_session(&self, match_id: Uuid, session: MatchSession) -> ScoreSyncController {
        self.sessions
            .entry(match_id)
            .or_insert(session)
            .controller()
            .clone()
    }

    /// Number of matches with a live session.
    pub fn loaded_matches(&self) -> usize {
        self.sessions.len()
    }

    /// Lifecycle snapshot of a match, if it has been touched since startup.
    pub fn lifecycle(&self, match_id: Uuid) -> Option<Snapshot> {
        self.lifecycles.get(&match_id).map(|sm| sm.snapshot())
    }

    /// Bring the in-memory lifecycle of a match in line with the status read from the store.
    pub fn observe_status(&self, match_id: Uuid, status: MatchStatus) {
        self.lifecycles
            .entry(match_id)
            .and_modify(|sm| {
                sm.observe(status);
            })
            .or_insert_with(|| MatchStateMachine::new(status));
    }

    fn transition_gate(&self, match_id: Uuid) -> Arc<Mutex<()>> {
        self.transition_gates.entry(match_id).or_default().clone()
    }

    fn plan_transition(&self, match_id: Uuid, event: MatchEvent) -> Result<Plan, PlanError> {
        let mut sm = self.lifecycles.entry(match_id).or_default();
        sm.plan(event)
    }

    fn apply_planned_transition(
        &self,
        match_id: Uuid,
        plan_id: PlanId,
    ) -> Result<MatchStatus, ApplyError> {
        let mut sm = self
            .lifecycles
            .get_mut(&match_id)
            .ok_or(ApplyError::NoPending)?;
        sm.apply(plan_id)
    }

    fn abort_transition(&self, match_id: Uuid, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self
            .lifecycles
            .get_mut(&match_id)
            .ok_or(AbortError::NoPending)?;
        sm.abort(plan_id)
    }

    /// Plan `event` for a match, run `work`, then apply on success or abort on
    /// failure or timeout. Returns the work's value and the resulting status.
    ///
    /// Transitions of one match run one at a time; other matches are not held up.
    pub async fn run_transition<F, Fut, T>(
        &self,
        match_id: Uuid,
        event: MatchEvent,
        work: F,
    ) -> Result<(T, MatchStatus), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate(match_id).lock_owned().await;
        let Plan { id: plan_id, .. } = self.plan_transition(match_id, event)?;

        let work_future = work();
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(match_id, plan_id) {
                        warn!(
                            %match_id,
                            ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let next = self.apply_planned_transition(match_id, plan_id)?;
                drop(gate);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(match_id, plan_id) {
                    warn!(
                        %match_id,
                        ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
