//! On-disk runtime state of a server.
//!
//! A running server is represented only by files inside its directory:
//!
//! * `server.pid` holds the decimal PID of the launched process.
//! * `current.log` holds the absolute path of the active console log.
//! * `logs/console_<YYYY-MM-DD_HH-MM-SS>.log` receives the process output.
use crate::config::ServerDefinition;
use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the PID file inside a server directory.
pub const PID_FILE: &str = "server.pid";
/// Name of the pointer file naming the active console log.
pub const POINTER_FILE: &str = "current.log";
/// Subdirectory receiving console logs.
pub const LOGS_DIR: &str = "logs";
/// Timestamp format shared by console logs and backup snapshots.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Formats a timestamp with second precision, sortable as text.
pub fn timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Paths of the runtime files for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFiles {
    root: PathBuf,
}

impl RuntimeFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn for_server(definition: &ServerDefinition) -> Self {
        Self::new(&definition.path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join(PID_FILE)
    }

    pub fn pointer_file(&self) -> PathBuf {
        self.root.join(POINTER_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Console log path for a launch at the given time.
    pub fn console_log(&self, started_at: DateTime<Local>) -> PathBuf {
        self.logs_dir()
            .join(format!("console_{}.log", timestamp(started_at)))
    }

    /// Raw contents of the PID file, or `None` if there is none.
    pub async fn read_pid_raw(&self) -> Result<Option<String>> {
        read_optional(&self.pid_file()).await
    }

    /// Parses the PID file into a PID.
    pub async fn read_pid(&self) -> Result<Option<u32>> {
        match self.read_pid_raw().await? {
            None => Ok(None),
            Some(raw) => parse_pid(&raw).map(Some).ok_or_else(|| {
                Error::Process(format!(
                    "PID file {} holds '{}', not a process id",
                    self.pid_file().display(),
                    raw.trim()
                ))
            }),
        }
    }

    pub async fn write_pid(&self, pid: u32) -> Result<()> {
        tokio::fs::write(self.pid_file(), pid.to_string()).await?;
        Ok(())
    }

    /// Removes the PID file. Returns whether a file was actually removed.
    pub async fn remove_pid(&self) -> Result<bool> {
        match tokio::fs::remove_file(self.pid_file()).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Path named by the pointer file, or `None` if there is none.
    pub async fn read_pointer(&self) -> Result<Option<PathBuf>> {
        Ok(read_optional(&self.pointer_file())
            .await?
            .map(|raw| PathBuf::from(raw.trim())))
    }

    pub async fn write_pointer(&self, log_path: &Path) -> Result<()> {
        tokio::fs::write(self.pointer_file(), log_path.to_string_lossy().as_bytes()).await?;
        Ok(())
    }
}

/// A PID must be a positive decimal integer; surrounding whitespace is ignored.
pub fn parse_pid(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|pid| *pid > 0)
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("1234"), Some(1234));
        assert_eq!(parse_pid(" 42\n"), Some(42));
        assert_eq!(parse_pid("0"), None);
        assert_eq!(parse_pid("-5"), None);
        assert_eq!(parse_pid("abc"), None);
        assert_eq!(parse_pid(""), None);
    }

    #[test]
    fn test_console_log_name() {
        let files = RuntimeFiles::new("/srv/mc/alpha");
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            files.console_log(at),
            PathBuf::from("/srv/mc/alpha/logs/console_2024-03-09_07-05-01.log")
        );
    }

    #[tokio::test]
    async fn test_pid_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let files = RuntimeFiles::new(dir.path());

        assert_eq!(files.read_pid().await.unwrap(), None);
        files.write_pid(4321).await.unwrap();
        assert_eq!(files.read_pid().await.unwrap(), Some(4321));
        assert!(files.remove_pid().await.unwrap());
        assert!(!files.remove_pid().await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = RuntimeFiles::new(dir.path());
        std::fs::write(files.pid_file(), "not-a-pid").unwrap();

        assert!(matches!(files.read_pid().await, Err(Error::Process(_))));
    }
}
