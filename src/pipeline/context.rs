//! Traversal context: the state one run threads through the walker and the dispatcher.

use crate::engine::cancel::CancelToken;
use crate::engine::progress::FetchProgress;
use crate::error::CatfindError;
use crate::types::Counters;

/// Counters, last-seen path and command, cancellation and progress for one traversal.
/// Owned by the coordinating thread; workers never see it.
pub struct TraversalContext {
    pub counters: Counters,
    pub cancel: CancelToken,
    /// Last leaf (or directory) visited, reported on fatal errors.
    pub last_path: String,
    /// Last command or statement dispatched, reported on fatal errors.
    pub last_command: Option<String>,
    pub progress: FetchProgress,
}

impl TraversalContext {
    pub fn new(cancel: CancelToken, progress: FetchProgress) -> Self {
        Self {
            counters: Counters::default(),
            cancel,
            last_path: String::new(),
            last_command: None,
            progress,
        }
    }

    /// `Interrupted` once the token is tripped.
    pub fn check_cancelled(&self) -> Result<(), CatfindError> {
        if self.cancel.is_cancelled() {
            return Err(CatfindError::Interrupted {
                last_path: self.last_path.clone(),
            });
        }
        Ok(())
    }

    /// Count one fetch call that returned `rows` rows.
    pub fn record_fetch(&mut self, rows: usize) {
        self.counters.fetches += 1;
        self.counters.rows += rows as u64;
        self.progress.tick();
    }
}

impl Default for TraversalContext {
    fn default() -> Self {
        Self::new(CancelToken::new(), FetchProgress::disabled())
    }
}
