use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Definition of a single Minecraft server.
///
/// A definition describes where the server lives on disk and how to launch
/// it. It is created and edited through the configuration and is treated as
/// immutable while the server runs.
///
/// # Examples
///
/// ```
/// use mc_runner::config::ServerDefinition;
///
/// let definition = ServerDefinition {
///     name: "Survival".to_string(),
///     path: "/srv/minecraft/survival".into(),
///     jar: "paper.jar".to_string(),
///     memory: "4G".to_string(),
///     port: 25565,
///     java_args: vec!["-XX:+UseG1GC".to_string()],
///     autostart: false,
/// };
/// assert_eq!(definition.jar_path(), std::path::Path::new("/srv/minecraft/survival/paper.jar"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Display name. Defaults to the server identifier.
    #[serde(default)]
    pub name: String,

    /// Root of the server's working directory. Defaults to `<servers_dir>/<id>`.
    #[serde(default)]
    pub path: PathBuf,

    /// File name of the server jar inside `path`.
    #[serde(default = "default_jar")]
    pub jar: String,

    /// Heap size applied to both `-Xms` and `-Xmx`, e.g. `2G` or `1536M`.
    #[serde(default = "default_memory")]
    pub memory: String,

    /// Port the server listens on. Informational only.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Extra JVM arguments placed before `-jar`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub java_args: Vec<String>,

    /// Start this server from `start_autostart_servers` and restart it from the monitor.
    #[serde(default)]
    pub autostart: bool,
}

impl ServerDefinition {
    /// Creates a definition with default jar, memory and port for the given path.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            jar: default_jar(),
            memory: default_memory(),
            port: default_port(),
            java_args: Vec::new(),
            autostart: false,
        }
    }

    /// Full path of the server jar.
    pub fn jar_path(&self) -> PathBuf {
        self.path.join(&self.jar)
    }
}

/// Timing of the escalating shutdown sequence.
///
/// `stop` sends a termination signal, polls every `poll_interval` until
/// `grace_period` has elapsed, then kills the process and waits `kill_grace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopPolicy {
    /// Time allowed for a cooperative shutdown, in seconds.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Interval between liveness probes while waiting, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Unconditional wait after the forced kill, in milliseconds.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

impl StopPolicy {
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

/// Main configuration for the MC Runner.
///
/// Holds the directory settings and the server definitions keyed by
/// identifier. Identifiers are kept in a sorted map so that listings and the
/// saved document are stable.
///
/// # JSON Schema
///
/// ```json
/// {
///   "servers_dir": "./servers",
///   "backups_dir": "./backups",
///   "java_path": "java",
///   "stop": { "grace_period_secs": 30, "poll_interval_ms": 1000, "kill_grace_ms": 1000 },
///   "servers": {
///     "survival": {
///       "name": "Survival",
///       "path": "/srv/minecraft/survival",
///       "jar": "paper.jar",
///       "memory": "4G",
///       "port": 25565
///     }
///   }
/// }
/// ```
///
/// # Examples
///
/// ```
/// use mc_runner::config::Config;
///
/// let config = Config::parse_from_str(r#"{
///     "servers_dir": "/srv/minecraft",
///     "servers": { "lobby": { "memory": "1G" } }
/// }"#).unwrap();
///
/// let lobby = &config.servers["lobby"];
/// assert_eq!(lobby.name, "lobby");
/// assert_eq!(lobby.path, std::path::Path::new("/srv/minecraft/lobby"));
/// assert_eq!(lobby.jar, "server.jar");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default parent directory for servers whose definition has no path.
    #[serde(default = "default_servers_dir")]
    pub servers_dir: PathBuf,

    /// Directory holding backup snapshots.
    #[serde(default = "default_backups_dir")]
    pub backups_dir: PathBuf,

    /// Java executable used to launch servers.
    #[serde(default = "default_java_path")]
    pub java_path: String,

    /// Shutdown timing shared by all servers.
    #[serde(default)]
    pub stop: StopPolicy,

    /// Map of server identifiers to their definitions.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            servers_dir: default_servers_dir(),
            backups_dir: default_backups_dir(),
            java_path: default_java_path(),
            stop: StopPolicy::default(),
            servers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads a configuration from a file path.
    ///
    /// A missing file yields the default configuration, matching a first run
    /// where nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file exists but cannot be read
    /// * The file contents are not valid JSON
    /// * The JSON does not conform to the expected schema
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse_from_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::ConfigParse(format!(
                "Failed to read config file: {}",
                e
            ))),
        }
    }

    /// Parses a configuration from a JSON string and fills in derived defaults.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))?;
        config.fill_defaults();
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    ///
    /// The document is written to a sibling temp file, synced and renamed
    /// over the target so a crash never leaves a truncated config behind.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("Failed to serialize config: {}", e)))?;

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, path)?;
        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Looks up a server definition.
    pub fn server(&self, id: &str) -> Result<&ServerDefinition> {
        self.servers
            .get(id)
            .ok_or_else(|| Error::ServerNotFound(id.to_string()))
    }

    /// Fills in the name and path of a definition being added under `id`.
    pub fn complete_definition(&self, id: &str, definition: &mut ServerDefinition) {
        complete(&self.servers_dir, id, definition);
    }

    fn fill_defaults(&mut self) {
        for (id, definition) in self.servers.iter_mut() {
            complete(&self.servers_dir, id, definition);
        }
    }
}

fn complete(servers_dir: &Path, id: &str, definition: &mut ServerDefinition) {
    if definition.name.is_empty() {
        definition.name = id.to_string();
    }
    if definition.path.as_os_str().is_empty() {
        definition.path = servers_dir.join(id);
    }
}

fn default_servers_dir() -> PathBuf {
    PathBuf::from("./servers")
}

fn default_backups_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_java_path() -> String {
    "java".to_string()
}

fn default_jar() -> String {
    "server.jar".to_string()
}

fn default_memory() -> String {
    "2G".to_string()
}

fn default_port() -> u16 {
    25565
}

fn default_grace_period_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_kill_grace_ms() -> u64 {
    1000
}
