//! In-process score store used for local runs and tests.

use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{MatchEntity, MatchStatus, ScoreWrite},
        score_store::{ScoreStore, roster_from_rows, validate_status_change, validate_write},
        storage::{StorageError, StorageResult},
    },
    scoring::{HoleScore, MatchPlayer, MatchRoster, ScoreGrid},
};

const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
struct MatchRecord {
    status: MatchStatus,
    players: Vec<MatchPlayer>,
    grid: ScoreGrid,
}

/// JSON seed file listing the matches to preload.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    /// Matches to insert.
    pub matches: Vec<MatchEntity>,
}

/// DashMap-backed store that broadcasts a change notification on every write.
#[derive(Clone)]
pub struct MemoryScoreStore {
    matches: Arc<DashMap<Uuid, MatchRecord>>,
    changes: broadcast::Sender<Uuid>,
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScoreStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            matches: Arc::new(DashMap::new()),
            changes,
        }
    }

    /// Insert or replace a match.
    pub fn insert_match(&self, entity: MatchEntity) {
        let record = MatchRecord {
            status: entity.status,
            players: entity.players,
            grid: entity.scores.into_iter().collect(),
        };
        self.matches.insert(entity.id, record);
    }

    /// Replace the roster rows of a match, as roster management does on a substitution.
    pub fn replace_players(&self, match_id: Uuid, players: Vec<MatchPlayer>) -> StorageResult<()> {
        let mut record = self
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| match_not_found(match_id))?;
        record.players = players;
        drop(record);
        self.notify(match_id);
        Ok(())
    }

    /// Build a store preloaded with the matches described in a JSON seed file.
    pub fn from_seed_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let seed: SeedFile = serde_json::from_str(&contents)?;
        let store = Self::new();
        let count = seed.matches.len();
        for entity in seed.matches {
            store.insert_match(entity);
        }
        info!(path = %path.display(), count, "seeded in-memory score store");
        Ok(store)
    }

    fn notify(&self, match_id: Uuid) {
        // No subscribers is fine: notifications only reduce latency.
        let _ = self.changes.send(match_id);
    }

    fn apply_write(&self, write: ScoreWrite) -> StorageResult<()> {
        let mut record = self
            .matches
            .get_mut(&write.match_id)
            .ok_or_else(|| match_not_found(write.match_id))?;
        let roster = roster_from_rows(write.match_id, &record.players)?;
        validate_write(record.status, &roster, &write)?;

        record.grid.apply(write.cell());
        drop(record);

        debug!(
            match_id = %write.match_id,
            player_id = %write.player_id,
            hole = %write.hole,
            score = ?write.score,
            "score stored"
        );
        self.notify(write.match_id);
        Ok(())
    }

    fn apply_status(&self, match_id: Uuid, status: MatchStatus) -> StorageResult<()> {
        let mut record = self
            .matches
            .get_mut(&match_id)
            .ok_or_else(|| match_not_found(match_id))?;
        let roster = roster_from_rows(match_id, &record.players)?;
        validate_status_change(record.status, status, &roster, &record.grid)?;

        let changed = record.status != status;
        record.status = status;
        drop(record);

        if changed {
            info!(%match_id, ?status, "match status changed");
            self.notify(match_id);
        }
        Ok(())
    }

    fn read<T>(
        &self,
        match_id: Uuid,
        f: impl FnOnce(&MatchRecord) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let record = self
            .matches
            .get(&match_id)
            .ok_or_else(|| match_not_found(match_id))?;
        f(&record)
    }
}

fn match_not_found(match_id: Uuid) -> StorageError {
    StorageError::not_found(format!("match `{match_id}`"))
}

impl ScoreStore for MemoryScoreStore {
    fn fetch_scores(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<HoleScore>>> {
        let result = self.read(match_id, |record| Ok(record.grid.entries()));
        Box::pin(async move { result })
    }

    fn write_score(&self, write: ScoreWrite) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.apply_write(write);
        Box::pin(async move { result })
    }

    fn fetch_roster(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<MatchRoster>> {
        let result = self.read(match_id, |record| roster_from_rows(match_id, &record.players));
        Box::pin(async move { result })
    }

    fn fetch_match_status(&self, match_id: Uuid) -> BoxFuture<'static, StorageResult<MatchStatus>> {
        let result = self.read(match_id, |record| Ok(record.status));
        Box::pin(async move { result })
    }

    fn set_match_status(
        &self,
        match_id: Uuid,
        status: MatchStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.apply_status(match_id, status);
        Box::pin(async move { result })
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<Uuid>> {
        Some(self.changes.subscribe())
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
