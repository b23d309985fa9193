use tokio::task::JoinHandle;

use crate::sync::ScoreSyncController;

/// A loaded match: its sync controller plus the background tasks bound to it.
///
/// Dropping the session stops those tasks.
pub struct MatchSession {
    controller: ScoreSyncController,
    tasks: Vec<JoinHandle<()>>,
}

impl MatchSession {
    /// Bind `tasks` to `controller`.
    pub fn new(controller: ScoreSyncController, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { controller, tasks }
    }

    /// Sync controller of the match.
    pub fn controller(&self) -> &ScoreSyncController {
        &self.controller
    }
}

impl Drop for MatchSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
