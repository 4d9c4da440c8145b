/*!
 # MC Runner

 A Rust library for supervising long-running Minecraft server processes on a
 single host.

 ## Overview

 MC Runner provides functionality to:
 - Start servers detached from the supervisor, with console output captured to a log
 - Answer "is this server actually running?" despite stale PID files, crashes or zombies
 - Stop servers gracefully, escalating to a forced kill after a bounded wait
 - Read back recent console output and send console commands
 - Snapshot server directories as backups and list existing snapshots

 ## Basic Usage

 ```no_run
 use mc_runner::{McRunner, Outcome, Result};

 #[tokio::main]
 async fn main() -> Result<()> {
     // Create a runner from config file
     let runner = McRunner::from_config_file("config.json")?;

     // Start a server
     let started = runner.start_server("survival").await?;
     println!("{}", started);

     // Look at its status and console
     let status = runner.get_server_status("survival").await?;
     println!("running: {}, pid: {:?}", status.running, status.pid);
     for line in runner.get_console_output("survival", 20).await? {
         println!("{}", line);
     }

     // Stop it, reporting the result the way a web UI would
     let outcome = Outcome::from(runner.stop_server("survival").await);
     println!("{}: {}", outcome.success, outcome.message);

     Ok(())
 }
 ```

 ## State

 The supervisor keeps no record of running servers in memory. Each server
 directory holds a `server.pid` file and a `current.log` pointer while the
 server runs, and every liveness check verifies the PID against the process
 table, deleting the file when it is stale. A supervisor restart therefore
 picks up servers it launched earlier.

 ## License

 This project is licensed under the terms in the LICENSE file.
*/

pub mod backup;
pub mod config;
pub mod console;
pub mod error;
pub mod outcome;
pub mod server;

pub use backup::{BackupManager, BackupSnapshot};
pub use config::{Config, ServerDefinition, StopPolicy};
pub use error::{Error, Result};
pub use outcome::{BackupCreated, Outcome, Started, Stopped};
pub use server::{ServerEvent, ServerLifecycleEvent, ServerStatusReport, StopOutcome};

use config::validator::validate_server_definition;
use console::ConsoleInputs;
use server::{LivenessChecker, ProcessTable, RuntimeFiles, ServerLifecycleManager, SystemProcessTable};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Configure and supervise Minecraft servers
///
/// This struct is the main entry point for the transport layer. All methods
/// take `&self`, so a runner can be shared behind an `Arc` and each start or
/// stop driven from its own task; operations on the same server are
/// serialized, operations on different servers are not.
/// All public methods are instrumented with `tracing` spans.
pub struct McRunner {
    /// Configuration
    config: RwLock<Config>,
    /// File the configuration is saved to after mutations
    config_path: Option<PathBuf>,
    /// Start/stop state machine
    lifecycle: ServerLifecycleManager,
}

impl McRunner {
    /// Create a new MC runner from a configuration file path
    ///
    /// A missing file starts from the default configuration; mutations are
    /// saved back to `path`.
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = Config::from_file(path.as_ref())?;
        let mut runner = Self::new(config)?;
        runner.config_path = Some(path.as_ref().to_path_buf());
        Ok(runner)
    }

    /// Create a new MC runner from a configuration string
    #[tracing::instrument(skip(config))]
    pub fn from_config_str(config: &str) -> Result<Self> {
        tracing::info!("Loading configuration from string");
        let config = Config::parse_from_str(config)?;
        Self::new(config)
    }

    /// Create a new MC runner from a configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigInvalid` if the configuration fails validation.
    #[tracing::instrument(skip(config), fields(num_servers = config.servers.len()))]
    pub fn new(config: Config) -> Result<Self> {
        Self::with_process_table(config, Arc::new(SystemProcessTable::new()))
    }

    /// Create a new MC runner that inspects and signals processes through `table`
    pub fn with_process_table(config: Config, table: Arc<dyn ProcessTable>) -> Result<Self> {
        config::validate_config(&config)?;
        tracing::info!("Creating new McRunner");
        let liveness = LivenessChecker::new(table);
        Ok(Self {
            config: RwLock::new(config),
            config_path: None,
            lifecycle: ServerLifecycleManager::new(liveness, Arc::new(ConsoleInputs::new())),
        })
    }

    /// The lifecycle manager, for event history and monitoring
    pub fn lifecycle(&self) -> &ServerLifecycleManager {
        &self.lifecycle
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Result<Config> {
        Ok(self.read_config()?.clone())
    }

    /// All configured servers keyed by identifier
    pub fn list_servers(&self) -> Result<BTreeMap<String, ServerDefinition>> {
        Ok(self.read_config()?.servers.clone())
    }

    /// Definition of one server
    pub fn server_definition(&self, id: &str) -> Result<ServerDefinition> {
        self.read_config()?.server(id).cloned()
    }

    /// Whether the server's process is alive, removing a stale PID file as a side effect.
    ///
    /// Unknown identifiers are simply not running.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn is_running(&self, id: &str) -> bool {
        match self.server_definition(id) {
            Ok(definition) => {
                let files = RuntimeFiles::for_server(&definition);
                self.lifecycle.liveness().is_running(id, &files).await
            }
            Err(_) => false,
        }
    }

    /// Status of one server, with CPU and memory figures when it runs
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn get_server_status(&self, id: &str) -> Result<ServerStatusReport> {
        let definition = self.server_definition(id)?;
        server::status::collect(self.lifecycle.liveness(), id, &definition).await
    }

    /// Status of every configured server
    #[tracing::instrument(skip(self))]
    pub async fn list_statuses(&self) -> Result<Vec<ServerStatusReport>> {
        let servers = self.list_servers()?;
        let mut statuses = Vec::with_capacity(servers.len());
        for (id, definition) in &servers {
            statuses.push(server::status::collect(self.lifecycle.liveness(), id, definition).await?);
        }
        Ok(statuses)
    }

    /// Start a server
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn start_server(&self, id: &str) -> Result<Started> {
        let (definition, java, _) = self.launch_settings(id)?;
        tracing::info!("Attempting to start server");
        let pid = self.lifecycle.start(id, &definition, &java).await?;
        Ok(Started {
            id: id.to_string(),
            pid,
        })
    }

    /// Stop a running server
    ///
    /// Blocks the calling task for up to the configured grace period plus the
    /// final kill grace.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn stop_server(&self, id: &str) -> Result<Stopped> {
        let (definition, _, policy) = self.launch_settings(id)?;
        tracing::info!("Attempting to stop server");
        let outcome = self.lifecycle.stop(id, &definition, &policy).await?;
        Ok(Stopped {
            id: id.to_string(),
            outcome,
        })
    }

    /// Stop a server if it is running, then start it again
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn restart_server(&self, id: &str) -> Result<Started> {
        let (definition, java, policy) = self.launch_settings(id)?;
        tracing::info!("Attempting to restart server");
        let pid = self.lifecycle.restart(id, &definition, &java, &policy).await?;
        Ok(Started {
            id: id.to_string(),
            pid,
        })
    }

    /// Start every server flagged `autostart`
    ///
    /// Each server reports its own outcome; one failure does not stop the rest.
    #[tracing::instrument(skip(self))]
    pub async fn start_autostart_servers(&self) -> Result<Vec<(String, Outcome)>> {
        let ids: Vec<String> = self
            .list_servers()?
            .into_iter()
            .filter(|(_, definition)| definition.autostart)
            .map(|(id, _)| id)
            .collect();
        tracing::debug!(servers_to_start = ?ids);

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.start_server(&id).await;
            if let Err(e) = &result {
                tracing::error!(server_id = %id, error = %e, "Autostart failed");
            }
            outcomes.push((id, Outcome::from(result)));
        }
        Ok(outcomes)
    }

    /// Stop every running server
    #[tracing::instrument(skip(self))]
    pub async fn stop_all_servers(&self) -> Result<Vec<(String, Outcome)>> {
        let ids: Vec<String> = self.list_servers()?.into_keys().collect();

        let mut outcomes = Vec::new();
        for id in ids {
            match self.stop_server(&id).await {
                Err(Error::NotRunning(_)) => {}
                result => outcomes.push((id, Outcome::from(result))),
            }
        }
        tracing::info!(stopped = outcomes.len(), "Stopped all running servers");
        Ok(outcomes)
    }

    /// Last `lines` lines of the server's active console log, oldest first
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn get_console_output(&self, id: &str, lines: usize) -> Result<Vec<String>> {
        let definition = self.server_definition(id)?;
        Ok(console::tail(&RuntimeFiles::for_server(&definition), lines).await)
    }

    /// Write a command line to the console of a running server
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn send_command(&self, id: &str, command: &str) -> Result<()> {
        let definition = self.server_definition(id)?;
        let files = RuntimeFiles::for_server(&definition);
        let pid = self
            .lifecycle
            .liveness()
            .running_pid(id, &files)
            .await
            .ok_or_else(|| Error::NotRunning(id.to_string()))?;
        self.lifecycle.consoles().send(id, pid, command).await
    }

    /// Snapshot the server's directory into the backups root
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn create_backup(&self, id: &str) -> Result<BackupCreated> {
        let definition = self.server_definition(id)?;
        let name = self.backups()?.create(id, &definition).await?;
        Ok(BackupCreated { name })
    }

    /// Existing snapshots, newest first, optionally only those of one server
    #[tracing::instrument(skip(self))]
    pub async fn list_backups(&self, id: Option<&str>) -> Result<Vec<BackupSnapshot>> {
        if let Some(id) = id {
            self.server_definition(id)?;
        }
        Ok(self.backups()?.list(id).await)
    }

    /// Lifecycle events of one server, newest first
    pub fn server_events(&self, id: &str, limit: Option<usize>) -> Result<Vec<ServerEvent>> {
        self.server_definition(id)?;
        self.lifecycle.get_server_events(id, limit)
    }

    /// Add a new server definition and save the configuration
    #[tracing::instrument(skip(self, definition), fields(server_id = %id))]
    pub fn add_server(&self, id: &str, mut definition: ServerDefinition) -> Result<()> {
        let mut config = self.write_config()?;
        if config.servers.contains_key(id) {
            return Err(Error::ConfigInvalid(format!("Server '{}' already exists", id)));
        }
        config.complete_definition(id, &mut definition);
        validate_server_definition(id, &definition)?;

        let mut updated = config.clone();
        updated.servers.insert(id.to_string(), definition);
        self.commit(&mut config, updated)?;
        tracing::info!("Server added");
        Ok(())
    }

    /// Replace a server definition and save the configuration
    ///
    /// The path and port of a running server cannot change.
    #[tracing::instrument(skip(self, definition), fields(server_id = %id))]
    pub async fn update_server(&self, id: &str, mut definition: ServerDefinition) -> Result<()> {
        let _guard = self.lifecycle.lock_server(id).await?;
        let current = self.server_definition(id)?;
        self.read_config()?.complete_definition(id, &mut definition);
        validate_server_definition(id, &definition)?;

        let files = RuntimeFiles::for_server(&current);
        if (definition.path != current.path || definition.port != current.port)
            && self.lifecycle.liveness().is_running(id, &files).await
        {
            return Err(Error::AlreadyRunning(id.to_string()));
        }

        let mut config = self.write_config()?;
        let mut updated = config.clone();
        updated.servers.insert(id.to_string(), definition);
        self.commit(&mut config, updated)?;
        tracing::info!("Server updated");
        Ok(())
    }

    /// Remove a stopped server's definition and save the configuration
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn remove_server(&self, id: &str) -> Result<()> {
        let _guard = self.lifecycle.lock_server(id).await?;
        let current = self.server_definition(id)?;

        let files = RuntimeFiles::for_server(&current);
        if self.lifecycle.liveness().is_running(id, &files).await {
            return Err(Error::AlreadyRunning(id.to_string()));
        }

        let mut config = self.write_config()?;
        let mut updated = config.clone();
        updated.servers.remove(id);
        self.commit(&mut config, updated)?;
        tracing::info!("Server removed");
        Ok(())
    }

    fn launch_settings(&self, id: &str) -> Result<(ServerDefinition, String, StopPolicy)> {
        let config = self.read_config()?;
        let definition = config.server(id)?.clone();
        Ok((definition, config.java_path.clone(), config.stop))
    }

    fn backups(&self) -> Result<BackupManager> {
        Ok(BackupManager::new(self.read_config()?.backups_dir.clone()))
    }

    /// Saves `updated` and only then makes it the live configuration.
    fn commit(&self, live: &mut Config, updated: Config) -> Result<()> {
        if let Some(path) = &self.config_path {
            updated.save_to_file(path)?;
        }
        *live = updated;
        Ok(())
    }

    fn read_config(&self) -> Result<std::sync::RwLockReadGuard<'_, Config>> {
        self.config
            .read()
            .map_err(|_| Error::Other("Failed to lock configuration".to_string()))
    }

    fn write_config(&self) -> Result<std::sync::RwLockWriteGuard<'_, Config>> {
        self.config
            .write()
            .map_err(|_| Error::Other("Failed to lock configuration".to_string()))
    }
}
