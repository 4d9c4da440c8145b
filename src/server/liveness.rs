//! Liveness checking with repair-on-read.
//!
//! The PID file is only a claim. [`LivenessChecker`] verifies it against the
//! process table on every call and deletes the file when it can prove the
//! claim stale: unparsable contents, no such process, or a zombie.
use crate::server::runtime::{RuntimeFiles, parse_pid};
use crate::server::table::{ProcessState, ProcessTable};
use std::sync::Arc;

/// Determines whether a server is really running.
#[derive(Clone)]
pub struct LivenessChecker {
    table: Arc<dyn ProcessTable>,
}

impl LivenessChecker {
    pub fn new(table: Arc<dyn ProcessTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<dyn ProcessTable> {
        &self.table
    }

    /// Returns the PID of the live server process, if there is one.
    ///
    /// Removes the PID file when it is corrupt or names a dead or zombie
    /// process. A PID file that cannot be read is left alone and reported as
    /// not running.
    #[tracing::instrument(skip(self, files), fields(server_id = %id))]
    pub async fn running_pid(&self, id: &str, files: &RuntimeFiles) -> Option<u32> {
        let raw = match files.read_pid_raw().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read PID file");
                return None;
            }
        };

        let Some(pid) = parse_pid(&raw) else {
            tracing::warn!(contents = %raw.trim(), "Removing corrupt PID file");
            self.clear(files).await;
            return None;
        };

        match self.table.state(pid) {
            ProcessState::Alive => {
                tracing::trace!(pid, "Server process alive");
                Some(pid)
            }
            state => {
                tracing::debug!(pid, ?state, "Removing stale PID file");
                self.clear(files).await;
                None
            }
        }
    }

    /// True only if the PID file names a live, non-zombie process.
    pub async fn is_running(&self, id: &str, files: &RuntimeFiles) -> bool {
        self.running_pid(id, files).await.is_some()
    }

    async fn clear(&self, files: &RuntimeFiles) {
        if let Err(e) = files.remove_pid().await {
            tracing::warn!(error = %e, "Failed to remove stale PID file");
        }
    }
}
