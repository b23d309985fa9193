//! Client-side owner of a match's score grid.
//!
//! Edits are applied locally first, then persisted one cell at a time with
//! bounded retries. At most one write per cell is in flight, so a cell's
//! writes reach the store in submission order. Refreshes pull the
//! authoritative score set and merge it at the cell level so that unconfirmed
//! local edits are never overwritten.

use std::{collections::HashMap, sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::{
    sync::{Mutex, broadcast, broadcast::error::RecvError, watch},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::{
        models::{MatchStatus, ScoreWrite},
        score_store::ScoreStore,
        storage::{StorageError, StorageResult},
    },
    scoring::{
        CellKey, Hole, HoleScore, MAX_GROSS_SCORE, MatchRoster, MatchTotals, MissingScore,
        ScoreGrid, Scorecard, StrokeAllocator, missing_scores,
    },
};

use super::{
    error::SyncError,
    phase::{SyncPhase, SyncPhaseEvent},
    policy::SyncPolicy,
};

const NOTICE_CAPACITY: usize = 64;

/// Persistence state of a locally edited cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CellSyncState {
    /// Write issued, no answer yet.
    Pending,
    /// Write failed transiently and will be sent again.
    Retrying {
        /// Failed attempts so far.
        attempt: u32,
    },
    /// Store confirmed the write.
    Saved,
    /// Every attempt failed; the local value is kept.
    Failed,
    /// Store refused the write; the local value is kept for correction.
    Rejected,
}

impl CellSyncState {
    fn is_confirmed(self) -> bool {
        self == CellSyncState::Saved
    }

    fn is_in_flight(self) -> bool {
        matches!(self, CellSyncState::Pending | CellSyncState::Retrying { .. })
    }
}

/// Per-cell feedback for the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncNotice {
    /// Match the cell belongs to.
    pub match_id: Uuid,
    /// Player of the cell.
    pub player_id: Uuid,
    /// Hole of the cell.
    pub hole: Hole,
    /// What happened to the write.
    #[serde(flatten)]
    pub kind: SyncNoticeKind,
}

/// Outcome reported to the scorer for one cell write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum SyncNoticeKind {
    /// The store confirmed the value.
    Saved,
    /// The write failed transiently and is sent again shortly.
    WillRetry {
        /// Failed attempts so far.
        attempt: u32,
    },
    /// Retries are exhausted; the value stays local.
    Failed {
        /// Last store error.
        message: String,
    },
    /// The store refused the value.
    Rejected {
        /// Reason given by the store.
        message: String,
    },
}

/// How a background cell write ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The store holds this value.
    Saved,
    /// A newer edit of the same cell exists; this write was dropped.
    Superseded,
    /// Retries are exhausted.
    Failed {
        /// Last store error.
        message: String,
    },
    /// The store refused the value.
    Rejected {
        /// Reason given by the store.
        message: String,
    },
}

/// Result of a local score entry.
#[derive(Debug)]
pub struct ScoreEntry {
    /// Scorecard recomputed from the optimistic grid.
    pub scorecard: Scorecard,
    /// Background write, absent when the cell already held this value.
    pub persist: Option<JoinHandle<PersistOutcome>>,
}

#[derive(Debug, Clone, Copy)]
struct CellEdit {
    revision: u64,
    score: Option<u8>,
    state: CellSyncState,
    /// Position in the confirmation order once the store saved this edit.
    confirmed: Option<u64>,
}

struct LocalState {
    roster: MatchRoster,
    status: MatchStatus,
    grid: ScoreGrid,
    edits: HashMap<CellKey, CellEdit>,
    last_revision: u64,
    confirmations: u64,
    in_flight: usize,
    batch_failed: bool,
}

struct ServerSnapshot {
    roster: MatchRoster,
    status: MatchStatus,
    scores: Vec<HoleScore>,
}

struct Inner {
    match_id: Uuid,
    store: Arc<dyn ScoreStore>,
    policy: SyncPolicy,
    local: Mutex<LocalState>,
    phase: watch::Sender<SyncPhase>,
    notices: broadcast::Sender<SyncNotice>,
    refreshed: watch::Sender<Scorecard>,
    /// Held while a cell write is in flight.
    cell_writes: DashMap<CellKey, Arc<Mutex<()>>>,
    /// Never sent on; receivers see it close when the controller goes away.
    alive: watch::Sender<()>,
}

/// Optimistic, retrying score grid of one match. Cheap to clone.
#[derive(Clone)]
pub struct ScoreSyncController {
    inner: Arc<Inner>,
}

impl ScoreSyncController {
    /// Fetch roster, status and scores of a match and start tracking it.
    pub async fn load(
        store: Arc<dyn ScoreStore>,
        match_id: Uuid,
        policy: SyncPolicy,
    ) -> Result<Self, SyncError> {
        let (phase, _rx) = watch::channel(SyncPhase::Loading);
        let (notices, _rx) = broadcast::channel(NOTICE_CAPACITY);

        let snapshot = fetch_snapshot(&store, match_id, policy.request_timeout).await?;
        StrokeAllocator::for_roster(&snapshot.roster)?;
        let grid: ScoreGrid = snapshot.scores.into_iter().collect();
        let (refreshed, _rx) = watch::channel(Scorecard::compute(&snapshot.roster, &grid)?);
        let (alive, _rx) = watch::channel(());

        let local = LocalState {
            roster: snapshot.roster,
            status: snapshot.status,
            grid,
            edits: HashMap::new(),
            last_revision: 0,
            confirmations: 0,
            in_flight: 0,
            batch_failed: false,
        };

        let inner = Arc::new(Inner {
            match_id,
            store,
            policy,
            local: Mutex::new(local),
            phase,
            notices,
            refreshed,
            cell_writes: DashMap::new(),
            alive,
        });
        inner.transition(SyncPhaseEvent::Loaded);
        info!(%match_id, "score sync loaded");

        Ok(Self { inner })
    }

    /// Match tracked by this controller.
    pub fn match_id(&self) -> Uuid {
        self.inner.match_id
    }

    /// Current save indicator.
    pub fn phase(&self) -> SyncPhase {
        *self.inner.phase.borrow()
    }

    /// Follow save indicator changes.
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.inner.phase.subscribe()
    }

    /// Follow per-cell write outcomes.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.inner.notices.subscribe()
    }

    /// Scorecards produced by refreshes that changed the grid.
    pub fn subscribe_refreshes(&self) -> watch::Receiver<Scorecard> {
        self.inner.refreshed.subscribe()
    }

    /// Last known match status.
    pub async fn status(&self) -> MatchStatus {
        self.inner.local.lock().await.status
    }

    /// Last known active roster.
    pub async fn roster(&self) -> MatchRoster {
        self.inner.local.lock().await.roster.clone()
    }

    /// Locally known scored cells, unconfirmed edits included.
    pub async fn scores(&self) -> Vec<HoleScore> {
        self.inner.local.lock().await.grid.entries()
    }

    /// Persistence state of a cell edited through this controller.
    pub async fn cell_state(&self, player_id: Uuid, hole: Hole) -> Option<CellSyncState> {
        let local = self.inner.local.lock().await;
        local.edits.get(&(player_id, hole)).map(|edit| edit.state)
    }

    /// Scorecard of the local grid, unconfirmed edits included.
    pub async fn scorecard(&self) -> Result<Scorecard, SyncError> {
        let local = self.inner.local.lock().await;
        Ok(Scorecard::compute(&local.roster, &local.grid)?)
    }

    /// Cells of active players still without a score.
    pub async fn missing(&self) -> Vec<MissingScore> {
        let local = self.inner.local.lock().await;
        missing_scores(&local.roster, &local.grid)
    }

    /// Local completeness check; `finalize` re-validates against the store.
    pub async fn can_finalize(&self) -> bool {
        self.missing().await.is_empty()
    }

    /// Local edits the store has not confirmed, oldest first.
    pub async fn unconfirmed(&self) -> Vec<ScoreWrite> {
        let local = self.inner.local.lock().await;
        let mut edits: Vec<(u64, ScoreWrite)> = local
            .edits
            .iter()
            .filter(|(_, edit)| !edit.state.is_confirmed())
            .map(|(&(player_id, hole), edit)| {
                (
                    edit.revision,
                    ScoreWrite {
                        match_id: self.inner.match_id,
                        player_id,
                        hole,
                        score: edit.score,
                    },
                )
            })
            .collect();
        edits.sort_by_key(|(revision, _)| *revision);
        edits.into_iter().map(|(_, write)| write).collect()
    }

    /// Set or clear a cell locally and persist it in the background.
    pub async fn enter_score(
        &self,
        player_id: Uuid,
        hole: Hole,
        score: Option<u8>,
    ) -> Result<ScoreEntry, SyncError> {
        if let Some(value) = score {
            if !(1..=MAX_GROSS_SCORE).contains(&value) {
                return Err(SyncError::InvalidScore(value));
            }
        }

        let mut local = self.inner.local.lock().await;
        if local.status == MatchStatus::Completed {
            return Err(SyncError::MatchCompleted);
        }
        if !local.roster.contains(player_id) {
            return Err(SyncError::UnknownPlayer(player_id));
        }

        let key = (player_id, hole);
        let unchanged = match local.edits.get(&key) {
            Some(edit) => {
                edit.score == score && (edit.state.is_in_flight() || edit.state.is_confirmed())
            }
            None => local.grid.get(player_id, hole) == score,
        };
        if unchanged {
            debug!(match_id = %self.inner.match_id, %player_id, %hole, "score unchanged; no write");
            return Ok(ScoreEntry {
                scorecard: Scorecard::compute(&local.roster, &local.grid)?,
                persist: None,
            });
        }

        let mut grid = local.grid.clone();
        grid.set(player_id, hole, score);
        let scorecard = Scorecard::compute(&local.roster, &grid)?;

        local.grid = grid;
        local.last_revision += 1;
        let revision = local.last_revision;
        local.edits.insert(
            key,
            CellEdit {
                revision,
                score,
                state: CellSyncState::Pending,
                confirmed: None,
            },
        );
        if local.in_flight == 0 {
            local.batch_failed = false;
        }
        local.in_flight += 1;
        self.inner.transition(SyncPhaseEvent::SaveStarted);
        drop(local);

        let write = ScoreWrite {
            match_id: self.inner.match_id,
            player_id,
            hole,
            score,
        };
        let inner = self.inner.clone();
        let persist = tokio::spawn(async move { inner.persist(write, revision).await });

        Ok(ScoreEntry {
            scorecard,
            persist: Some(persist),
        })
    }

    /// Pull the authoritative state and merge it into the local grid.
    ///
    /// Server values win except for cells whose local edit is unconfirmed or
    /// was confirmed after the fetch started. A scorecard that differs from
    /// the previous grid is published to [`Self::subscribe_refreshes`].
    pub async fn refresh(&self) -> Result<Scorecard, SyncError> {
        let started = self.inner.local.lock().await.confirmations;
        let snapshot = fetch_snapshot(
            &self.inner.store,
            self.inner.match_id,
            self.inner.policy.request_timeout,
        )
        .await?;
        StrokeAllocator::for_roster(&snapshot.roster)?;

        let mut local = self.inner.local.lock().await;
        let mut grid: ScoreGrid = snapshot.scores.into_iter().collect();
        local
            .edits
            .retain(|_, edit| !edit.confirmed.is_some_and(|seq| seq <= started));
        for (&(player_id, hole), edit) in &local.edits {
            grid.set(player_id, hole, edit.score);
        }

        let changed = local.grid != grid || local.roster != snapshot.roster;
        local.grid = grid;
        local.roster = snapshot.roster;
        local.status = snapshot.status;
        let scorecard = Scorecard::compute(&local.roster, &local.grid)?;
        drop(local);

        debug!(match_id = %self.inner.match_id, changed, "scores refreshed");
        if changed {
            self.inner.refreshed.send_replace(scorecard.clone());
        }
        Ok(scorecard)
    }

    /// Close the match once every active player has scored every hole.
    ///
    /// Completeness is checked locally, then again on freshly fetched state,
    /// and every local edit must be confirmed before the status is written.
    pub async fn finalize(&self) -> Result<MatchTotals, SyncError> {
        {
            let local = self.inner.local.lock().await;
            if local.status == MatchStatus::Completed {
                return Err(SyncError::MatchCompleted);
            }
            let missing = missing_scores(&local.roster, &local.grid);
            if !missing.is_empty() {
                return Err(SyncError::Incomplete(missing));
            }
        }

        let scorecard = self.refresh().await?;
        if !scorecard.missing.is_empty() {
            return Err(SyncError::Incomplete(scorecard.missing));
        }

        {
            let local = self.inner.local.lock().await;
            let mut unsaved: Vec<CellKey> = local
                .edits
                .iter()
                .filter(|(_, edit)| !edit.state.is_confirmed())
                .map(|(key, _)| *key)
                .collect();
            if !unsaved.is_empty() {
                unsaved.sort();
                return Err(SyncError::UnsavedEdits(unsaved));
            }
        }

        let match_id = self.inner.match_id;
        with_timeout(
            self.inner.policy.request_timeout,
            self.inner
                .store
                .set_match_status(match_id, MatchStatus::Completed),
        )
        .await?;

        self.inner.local.lock().await.status = MatchStatus::Completed;
        info!(%match_id, home = %scorecard.totals.home, away = %scorecard.totals.away, "match finalized");
        Ok(scorecard.totals)
    }

    /// Keep the grid fresh in the background.
    ///
    /// Refreshes on every change notification for this match; polls at
    /// [`SyncPolicy::poll_interval`] when the store has no feed or the feed
    /// closes. The task ends once every controller handle is dropped.
    pub fn spawn_watch(&self) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let match_id = self.inner.match_id;
        let policy = self.inner.policy;
        let mut alive = self.inner.alive.subscribe();
        let mut feed = self.inner.store.subscribe_changes();
        if feed.is_none() {
            info!(%match_id, "no change feed; polling for score changes");
        }

        tokio::spawn(async move {
            loop {
                let trigger = tokio::select! {
                    _ = alive.changed() => break,
                    wake = next_wake(&mut feed, match_id, policy) => wake,
                };

                let trigger = match trigger {
                    Wake::Refresh(trigger) => trigger,
                    Wake::Skip => continue,
                    Wake::FeedClosed => {
                        warn!(%match_id, "change feed closed; falling back to polling");
                        feed = None;
                        continue;
                    }
                };

                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let controller = ScoreSyncController { inner };
                if let Err(err) = controller.refresh().await {
                    warn!(%match_id, trigger, error = %err, "score refresh failed");
                }
            }
            debug!(%match_id, "score watch stopped");
        })
    }
}

enum Wake {
    Refresh(&'static str),
    Skip,
    FeedClosed,
}

async fn next_wake(
    feed: &mut Option<broadcast::Receiver<Uuid>>,
    match_id: Uuid,
    policy: SyncPolicy,
) -> Wake {
    match feed.as_mut() {
        Some(rx) => match rx.recv().await {
            Ok(changed) if changed == match_id => Wake::Refresh("change feed"),
            Ok(_) => Wake::Skip,
            Err(RecvError::Lagged(skipped)) => {
                debug!(%match_id, skipped, "change feed lagged");
                Wake::Refresh("change feed lagged")
            }
            Err(RecvError::Closed) => Wake::FeedClosed,
        },
        None => {
            sleep(policy.poll_interval()).await;
            Wake::Refresh("poll")
        }
    }
}

impl Inner {
    fn transition(&self, event: SyncPhaseEvent) {
        self.phase.send_if_modified(|phase| match phase.next(event) {
            Ok(next) if next != *phase => {
                *phase = next;
                true
            }
            Ok(_) => false,
            Err(err) => {
                debug!(match_id = %self.match_id, error = %err, "sync phase event ignored");
                false
            }
        });
    }

    fn notify(&self, write: &ScoreWrite, kind: SyncNoticeKind) {
        let _ = self.notices.send(SyncNotice {
            match_id: self.match_id,
            player_id: write.player_id,
            hole: write.hole,
            kind,
        });
    }

    async fn is_latest(&self, key: CellKey, revision: u64) -> bool {
        let local = self.local.lock().await;
        local
            .edits
            .get(&key)
            .is_some_and(|edit| edit.revision == revision)
    }

    fn cell_slot(&self, key: CellKey) -> Arc<Mutex<()>> {
        self.cell_writes.entry(key).or_default().clone()
    }

    async fn persist(self: Arc<Self>, write: ScoreWrite, revision: u64) -> PersistOutcome {
        let key = (write.player_id, write.hole);
        let slot = self.cell_slot(key);
        let mut attempt = 0;

        let outcome = loop {
            attempt += 1;
            let result = {
                // Newer writes of this cell wait until this request is answered.
                let _slot = slot.lock().await;
                if !self.is_latest(key, revision).await {
                    break self.superseded(&write, attempt);
                }
                match timeout(self.policy.request_timeout, self.store.write_score(write)).await {
                    Ok(result) => result,
                    Err(elapsed) => Err(StorageError::unavailable(
                        "score write timed out".into(),
                        elapsed,
                    )),
                }
            };
            if !self.is_latest(key, revision).await {
                break self.superseded(&write, attempt);
            }

            match result {
                Ok(()) => break PersistOutcome::Saved,
                Err(err) if !err.is_transient() => {
                    warn!(
                        match_id = %self.match_id,
                        player_id = %write.player_id,
                        hole = %write.hole,
                        error = %err,
                        "score write rejected"
                    );
                    break PersistOutcome::Rejected {
                        message: err.to_string(),
                    };
                }
                Err(err) if attempt < self.policy.max_attempts => {
                    warn!(
                        match_id = %self.match_id,
                        player_id = %write.player_id,
                        hole = %write.hole,
                        attempt,
                        error = %err,
                        "score write failed; will retry"
                    );
                    self.mark_retrying(&write, revision, attempt).await;
                    sleep(self.policy.retry_delay).await;
                }
                Err(err) => {
                    error!(
                        match_id = %self.match_id,
                        player_id = %write.player_id,
                        hole = %write.hole,
                        attempt,
                        error = %err,
                        "score write failed; giving up"
                    );
                    break PersistOutcome::Failed {
                        message: err.to_string(),
                    };
                }
            }
        };

        self.finish(&write, revision, &outcome).await;
        if outcome == PersistOutcome::Saved {
            self.promote_status().await;
        }
        outcome
    }

    fn superseded(&self, write: &ScoreWrite, attempt: u32) -> PersistOutcome {
        debug!(
            match_id = %self.match_id,
            player_id = %write.player_id,
            hole = %write.hole,
            attempt,
            "score write superseded by a newer edit"
        );
        PersistOutcome::Superseded
    }

    async fn mark_retrying(&self, write: &ScoreWrite, revision: u64, attempt: u32) {
        let mut local = self.local.lock().await;
        match local.edits.get_mut(&(write.player_id, write.hole)) {
            Some(edit) if edit.revision == revision => {
                edit.state = CellSyncState::Retrying { attempt };
            }
            _ => return,
        }
        self.transition(SyncPhaseEvent::RetryScheduled { attempt });
        drop(local);
        self.notify(write, SyncNoticeKind::WillRetry { attempt });
    }

    async fn finish(self: &Arc<Self>, write: &ScoreWrite, revision: u64, outcome: &PersistOutcome) {
        let mut guard = self.local.lock().await;
        let local = &mut *guard;
        local.in_flight = local.in_flight.saturating_sub(1);

        let (state, notice) = match outcome {
            PersistOutcome::Saved => (Some(CellSyncState::Saved), Some(SyncNoticeKind::Saved)),
            PersistOutcome::Superseded => (None, None),
            PersistOutcome::Failed { message } => (
                Some(CellSyncState::Failed),
                Some(SyncNoticeKind::Failed {
                    message: message.clone(),
                }),
            ),
            PersistOutcome::Rejected { message } => (
                Some(CellSyncState::Rejected),
                Some(SyncNoticeKind::Rejected {
                    message: message.clone(),
                }),
            ),
        };
        if matches!(
            outcome,
            PersistOutcome::Failed { .. } | PersistOutcome::Rejected { .. }
        ) {
            local.batch_failed = true;
        }

        let mut notice = notice;
        if let Some(state) = state {
            match local.edits.get_mut(&(write.player_id, write.hole)) {
                Some(edit) if edit.revision == revision => {
                    edit.state = state;
                    if state.is_confirmed() {
                        local.confirmations += 1;
                        edit.confirmed = Some(local.confirmations);
                    }
                }
                // A newer edit took over while this one was answered.
                _ => notice = None,
            }
        }

        let settled = local.in_flight == 0;
        if settled {
            if local.batch_failed {
                self.transition(SyncPhaseEvent::SaveFailed);
            } else {
                self.transition(SyncPhaseEvent::SaveSucceeded);
            }
        }
        drop(guard);

        if let Some(kind) = notice {
            self.notify(write, kind);
        }
        if settled && *self.phase.borrow() == SyncPhase::Saved {
            let inner = Arc::downgrade(self);
            let linger = self.policy.saved_linger;
            tokio::spawn(async move {
                sleep(linger).await;
                if let Some(inner) = inner.upgrade() {
                    if *inner.phase.borrow() == SyncPhase::Saved {
                        inner.transition(SyncPhaseEvent::Settled);
                    }
                }
            });
        }
    }

    /// First confirmed score moves a scheduled match to in-progress.
    async fn promote_status(&self) {
        if self.local.lock().await.status != MatchStatus::Scheduled {
            return;
        }

        let result = with_timeout(
            self.policy.request_timeout,
            self.store
                .set_match_status(self.match_id, MatchStatus::InProgress),
        )
        .await;

        match result {
            Ok(()) => {
                let mut local = self.local.lock().await;
                if local.status == MatchStatus::Scheduled {
                    local.status = MatchStatus::InProgress;
                }
                info!(match_id = %self.match_id, "match in progress");
            }
            Err(err) => {
                warn!(match_id = %self.match_id, error = %err, "failed to mark match in progress");
            }
        }
    }
}

async fn with_timeout<T>(
    limit: Duration,
    request: BoxFuture<'static, StorageResult<T>>,
) -> Result<T, SyncError> {
    match timeout(limit, request).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SyncError::Timeout),
    }
}

async fn fetch_snapshot(
    store: &Arc<dyn ScoreStore>,
    match_id: Uuid,
    limit: Duration,
) -> Result<ServerSnapshot, SyncError> {
    let (roster, status, scores) = tokio::try_join!(
        with_timeout(limit, store.fetch_roster(match_id)),
        with_timeout(limit, store.fetch_match_status(match_id)),
        with_timeout(limit, store.fetch_scores(match_id)),
    )?;
    Ok(ServerSnapshot {
        roster,
        status,
        scores,
    })
}
