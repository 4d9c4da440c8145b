use crate::McRunner;
use crate::error::{Error, Result};
use crate::server::lifecycle::ServerLifecycleEvent;
use crate::server::runtime::RuntimeFiles;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

/// Server health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHealth {
    /// Server process is alive
    Running,
    /// Server is not running and was not expected to be
    Stopped,
    /// Server died without a stop request
    Exited,
}

/// Server monitor configuration
#[derive(Debug, Clone)]
pub struct ServerMonitorConfig {
    /// Check interval
    pub check_interval: Duration,
    /// Restart exited servers flagged `autostart`
    pub auto_restart: bool,
    /// Pause before an automatic restart
    pub restart_delay: Duration,
}

impl Default for ServerMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            auto_restart: false,
            restart_delay: Duration::from_secs(5),
        }
    }
}

/// Server monitor
///
/// Periodically re-checks every configured server. A server whose process is
/// gone although it was expected to run has crashed: the monitor records
/// `Exited` for it and, when enabled, starts it again.
///
/// A server is expected to run when its latest lifecycle event is `Started`,
/// or when an earlier sweep of this monitor saw it alive and no stop was
/// requested since. Servers launched before a supervisor restart are
/// therefore only watched from the first sweep that finds them running.
/// Servers whose operation lock is held by a start or stop are skipped for
/// that sweep.
pub struct ServerMonitor {
    /// Supervisor being watched
    runner: Arc<McRunner>,
    /// Health of each server as of the last sweep
    health: Arc<Mutex<HashMap<String, ServerHealth>>>,
    /// Monitor configuration
    config: ServerMonitorConfig,
    /// Monitor task
    monitor_task: Option<JoinHandle<()>>,
}

impl ServerMonitor {
    /// Create a new server monitor
    pub fn new(runner: Arc<McRunner>, config: ServerMonitorConfig) -> Self {
        Self {
            runner,
            health: Arc::new(Mutex::new(HashMap::new())),
            config,
            monitor_task: None,
        }
    }

    /// Start the monitor
    pub fn start(&mut self) -> Result<()> {
        if self.monitor_task.is_some() {
            return Ok(());
        }

        let runner = Arc::clone(&self.runner);
        let health = Arc::clone(&self.health);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let mut interval = time::interval(config.check_interval);
            loop {
                interval.tick().await;
                if let Err(e) = sweep(&runner, &health, &config).await {
                    tracing::error!(error = %e, "Monitor sweep failed");
                }
            }
        });

        tracing::info!(interval = ?self.config.check_interval, "Server monitor started");
        self.monitor_task = Some(task);
        Ok(())
    }

    /// Stop the monitor
    pub fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.monitor_task.take() {
            task.abort();
            tracing::info!("Server monitor stopped");
        }
        Ok(())
    }

    /// Whether the background task is active
    pub fn is_active(&self) -> bool {
        self.monitor_task.is_some()
    }

    /// Run one sweep immediately
    pub async fn check_now(&self) -> Result<HashMap<String, ServerHealth>> {
        sweep(&self.runner, &self.health, &self.config).await?;
        self.get_all_health()
    }

    /// Get server health as of the last sweep
    pub fn get_health(&self, id: &str) -> Result<ServerHealth> {
        let health = self
            .health
            .lock()
            .map_err(|_| Error::Other("Failed to lock health statuses".to_string()))?;

        health
            .get(id)
            .copied()
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))
    }

    /// Get all health statuses
    pub fn get_all_health(&self) -> Result<HashMap<String, ServerHealth>> {
        let health = self
            .health
            .lock()
            .map_err(|_| Error::Other("Failed to lock health statuses".to_string()))?;

        Ok(health.clone())
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.monitor_task.take() {
            task.abort();
        }
    }
}

async fn sweep(
    runner: &McRunner,
    health: &Mutex<HashMap<String, ServerHealth>>,
    config: &ServerMonitorConfig,
) -> Result<()> {
    let previous = health
        .lock()
        .map_err(|_| Error::Other("Failed to lock health statuses".to_string()))?
        .clone();
    let settings = runner.config()?;
    let lifecycle = runner.lifecycle();
    let mut observed = HashMap::with_capacity(settings.servers.len());

    for (id, definition) in &settings.servers {
        // a start or stop in progress owns the server until it finishes
        let Some(guard) = lifecycle.try_lock_server(id)? else {
            tracing::debug!(server_id = %id, "Server busy, skipping");
            if let Some(status) = previous.get(id) {
                observed.insert(id.clone(), *status);
            }
            continue;
        };

        let files = RuntimeFiles::for_server(definition);
        let seen_running = previous.get(id) == Some(&ServerHealth::Running);
        let status = if lifecycle.liveness().is_running(id, &files).await {
            ServerHealth::Running
        } else if expected_running(lifecycle.latest_event(id)?, seen_running) {
            tracing::warn!(server_id = %id, "Server exited unexpectedly");
            lifecycle.record_event(
                id,
                ServerLifecycleEvent::Exited,
                Some("Process no longer running".to_string()),
            )?;
            if let Err(e) = lifecycle.consoles().release(id) {
                tracing::warn!(server_id = %id, error = %e, "Failed to release console input");
            }
            ServerHealth::Exited
        } else {
            ServerHealth::Stopped
        };
        drop(guard);

        let status = if status == ServerHealth::Exited && config.auto_restart && definition.autostart {
            time::sleep(config.restart_delay).await;
            match lifecycle
                .start_after_exit(id, definition, &settings.java_path)
                .await
            {
                Ok(Some(pid)) => {
                    tracing::info!(server_id = %id, pid, "Server restarted");
                    ServerHealth::Running
                }
                Ok(None) => {
                    if runner.is_running(id).await {
                        ServerHealth::Running
                    } else {
                        ServerHealth::Stopped
                    }
                }
                Err(e) => {
                    tracing::error!(server_id = %id, error = %e, "Automatic restart failed");
                    ServerHealth::Exited
                }
            }
        } else {
            status
        };
        observed.insert(id.clone(), status);
    }

    let mut health = health
        .lock()
        .map_err(|_| Error::Other("Failed to lock health statuses".to_string()))?;
    *health = observed;
    Ok(())
}

/// A dead server counts as crashed if it was last started by this supervisor,
/// or if an earlier sweep saw it running and no stop was requested since.
fn expected_running(latest: Option<ServerLifecycleEvent>, seen_running: bool) -> bool {
    match latest {
        Some(ServerLifecycleEvent::Started) => true,
        Some(ServerLifecycleEvent::Stopped | ServerLifecycleEvent::Killed) => false,
        Some(ServerLifecycleEvent::Exited | ServerLifecycleEvent::Failed) | None => seen_running,
    }
}
