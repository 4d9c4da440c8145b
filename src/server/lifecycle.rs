use crate::config::{ServerDefinition, StopPolicy};
use crate::console::ConsoleInputs;
use crate::error::{Error, Result};
use crate::server::liveness::LivenessChecker;
use crate::server::process::{LaunchCommand, ServerProcess};
use crate::server::runtime::RuntimeFiles;
use crate::server::table::StopSignal;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tokio::time::{self, Instant};

const MAX_EVENTS: usize = 1000;

/// Server lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLifecycleEvent {
    /// Server launched and its PID recorded
    Started,
    /// Server exited after the termination signal
    Stopped,
    /// Server ignored the termination signal and was killed
    Killed,
    /// Launch failed
    Failed,
    /// Server was found dead without a stop request
    Exited,
}

/// Server lifecycle event
#[derive(Debug, Clone)]
pub struct ServerEvent {
    /// Server identifier
    pub id: String,
    /// Event type
    pub event: ServerLifecycleEvent,
    /// Event timestamp
    pub timestamp: DateTime<Local>,
    /// Event details
    pub details: Option<String>,
}

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited within the grace period
    Graceful,
    /// The process had to be killed
    Forced,
}

/// Server lifecycle manager.
///
/// Owns the `STOPPED -> STARTING -> RUNNING -> STOPPING -> STOPPED`
/// transitions. No state is kept in memory between calls: whether a server
/// is running is always re-derived from its PID file and the process table,
/// so a restarted supervisor picks up servers it launched earlier.
///
/// Start, stop and restart for one server identifier are serialized by a
/// per-identifier lock, closing the window between the liveness check and
/// the PID file write.
pub struct ServerLifecycleManager {
    /// Liveness checker shared with status reporting
    liveness: LivenessChecker,
    /// Console stdin pipes of launched servers
    consoles: Arc<ConsoleInputs>,
    /// Per-server operation locks, created on first use
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    /// Event history, oldest first
    events: Mutex<Vec<ServerEvent>>,
}

impl ServerLifecycleManager {
    /// Create a new server lifecycle manager
    pub fn new(liveness: LivenessChecker, consoles: Arc<ConsoleInputs>) -> Self {
        Self {
            liveness,
            consoles,
            locks: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Liveness checker used for every start and stop
    pub fn liveness(&self) -> &LivenessChecker {
        &self.liveness
    }

    /// Console stdin pipes of the servers this manager launched
    pub fn consoles(&self) -> &Arc<ConsoleInputs> {
        &self.consoles
    }

    /// Acquires the operation lock for a server.
    pub async fn lock_server(&self, id: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| Error::Other("Failed to lock server locks".to_string()))?;
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        Ok(lock.lock_owned().await)
    }

    /// Acquires the operation lock for a server unless an operation holds it.
    pub fn try_lock_server(&self, id: &str) -> Result<Option<OwnedMutexGuard<()>>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| Error::Other("Failed to lock server locks".to_string()))?;
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        Ok(lock.try_lock_owned().ok())
    }

    /// Starts a server and returns its PID.
    pub async fn start(&self, id: &str, definition: &ServerDefinition, java: &str) -> Result<u32> {
        let _guard = self.lock_server(id).await?;
        self.start_locked(id, definition, java).await
    }

    /// Stops a server with the escalating signal sequence of `policy`.
    pub async fn stop(
        &self,
        id: &str,
        definition: &ServerDefinition,
        policy: &StopPolicy,
    ) -> Result<StopOutcome> {
        let _guard = self.lock_server(id).await?;
        self.stop_locked(id, definition, policy).await
    }

    /// Stops the server if it is running, then starts it, without releasing the lock.
    pub async fn restart(
        &self,
        id: &str,
        definition: &ServerDefinition,
        java: &str,
        policy: &StopPolicy,
    ) -> Result<u32> {
        let _guard = self.lock_server(id).await?;
        match self.stop_locked(id, definition, policy).await {
            Ok(_) | Err(Error::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        self.start_locked(id, definition, java).await
    }

    /// Starts a server whose latest event is `Exited`.
    ///
    /// Returns `None` without starting anything if another operation started
    /// or stopped the server since the exit was recorded.
    pub async fn start_after_exit(
        &self,
        id: &str,
        definition: &ServerDefinition,
        java: &str,
    ) -> Result<Option<u32>> {
        let _guard = self.lock_server(id).await?;
        if self.latest_event(id)? != Some(ServerLifecycleEvent::Exited) {
            tracing::debug!(server_id = %id, "Server changed since its exit, not restarting");
            return Ok(None);
        }
        self.start_locked(id, definition, java).await.map(Some)
    }

    #[tracing::instrument(skip(self, definition, java), fields(server_id = %id))]
    async fn start_locked(&self, id: &str, definition: &ServerDefinition, java: &str) -> Result<u32> {
        let files = RuntimeFiles::for_server(definition);

        if self.liveness.is_running(id, &files).await {
            tracing::debug!("Server already running");
            return Err(Error::AlreadyRunning(id.to_string()));
        }

        tokio::fs::create_dir_all(files.logs_dir()).await.map_err(|e| {
            Error::Io(format!(
                "Failed to create {}: {}",
                files.logs_dir().display(),
                e
            ))
        })?;

        let jar = definition.jar_path();
        if !tokio::fs::try_exists(&jar).await.unwrap_or(false) {
            tracing::error!(jar = %jar.display(), "Server jar missing");
            return Err(Error::MissingArtifact(jar));
        }

        // the pointer file must hold an absolute path
        let root = tokio::fs::canonicalize(files.root()).await?;
        let files = RuntimeFiles::new(root);
        let log_path = files.console_log(Local::now());
        let command = LaunchCommand::build(java, definition, &files.root().join(&definition.jar));
        tracing::debug!(command = ?command, log = %log_path.display(), "Launching server");

        let mut process = match ServerProcess::spawn(&command, &log_path) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(error = %e, "Failed to launch server");
                self.record(id, ServerLifecycleEvent::Failed, Some(e.to_string()));
                return Err(e);
            }
        };
        let pid = process.pid();

        if let Err(e) = files.write_pid(pid).await {
            // without a PID file the process would be unsupervised
            tracing::error!(pid, error = %e, "Failed to record PID, killing server");
            if let Err(kill_err) = self.liveness.table().signal(pid, StopSignal::Kill) {
                tracing::error!(pid, error = %kill_err, "Failed to kill unrecorded server");
            }
            let e = Error::Io(format!("Failed to write PID file: {}", e));
            self.record(id, ServerLifecycleEvent::Failed, Some(e.to_string()));
            return Err(e);
        }

        if let Err(e) = files.write_pointer(process.log_path()).await {
            tracing::warn!(error = %e, "Failed to record console log path");
        }

        match process.take_stdin() {
            Ok(stdin) => {
                if let Err(e) = self.consoles.register(id, pid, stdin) {
                    tracing::warn!(error = %e, "Failed to keep console input");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Server started without console input"),
        }

        tracing::info!(pid, log = %log_path.display(), "Server started");
        self.record(id, ServerLifecycleEvent::Started, Some(format!("PID {}", pid)));
        Ok(pid)
    }

    #[tracing::instrument(skip(self, definition, policy), fields(server_id = %id))]
    async fn stop_locked(
        &self,
        id: &str,
        definition: &ServerDefinition,
        policy: &StopPolicy,
    ) -> Result<StopOutcome> {
        let files = RuntimeFiles::for_server(definition);

        let Some(pid) = self.liveness.running_pid(id, &files).await else {
            return Err(Error::NotRunning(id.to_string()));
        };
        let table = self.liveness.table();

        tracing::info!(pid, "Sending termination signal");
        table.signal(pid, StopSignal::Terminate)?;

        let deadline = Instant::now() + policy.grace_period();
        let mut exited = false;
        loop {
            if !table.state(pid).is_alive() {
                exited = true;
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            time::sleep(policy.poll_interval().min(deadline - now)).await;
        }

        let outcome = if exited {
            StopOutcome::Graceful
        } else {
            tracing::warn!(pid, grace = ?policy.grace_period(), "Server ignored termination, killing");
            table.signal(pid, StopSignal::Kill)?;
            time::sleep(policy.kill_grace()).await;
            StopOutcome::Forced
        };

        files.remove_pid().await?;
        if let Err(e) = self.consoles.release(id) {
            tracing::warn!(error = %e, "Failed to release console input");
        }

        let event = match outcome {
            StopOutcome::Graceful => ServerLifecycleEvent::Stopped,
            StopOutcome::Forced => ServerLifecycleEvent::Killed,
        };
        tracing::info!(pid, ?outcome, "Server stopped");
        self.record(id, event, Some(format!("PID {}", pid)));
        Ok(outcome)
    }

    fn record(&self, id: &str, event: ServerLifecycleEvent, details: Option<String>) {
        if let Err(e) = self.record_event(id, event, details) {
            tracing::warn!(error = %e, "Failed to record lifecycle event");
        }
    }

    /// Record a server event
    pub fn record_event(
        &self,
        id: &str,
        event: ServerLifecycleEvent,
        details: Option<String>,
    ) -> Result<()> {
        let server_event = ServerEvent {
            id: id.to_string(),
            event,
            timestamp: Local::now(),
            details,
        };

        let mut events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

        events.push(server_event);

        // Limit event history
        if events.len() > MAX_EVENTS {
            events.remove(0);
        }

        Ok(())
    }

    /// Get recent events for a server, newest first
    pub fn get_server_events(&self, id: &str, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

        // insertion order is chronological
        let server_events = events
            .iter()
            .rev()
            .filter(|e| e.id == id)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(server_events)
    }

    /// Type of the most recent event of a server
    pub fn latest_event(&self, id: &str) -> Result<Option<ServerLifecycleEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

        Ok(events.iter().rev().find(|e| e.id == id).map(|e| e.event))
    }

    /// Get all events, newest first
    pub fn get_all_events(&self, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

        Ok(events
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    /// Clear events
    pub fn clear_events(&self) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| Error::Other("Failed to lock server events".to_string()))?;

        events.clear();

        Ok(())
    }
}
