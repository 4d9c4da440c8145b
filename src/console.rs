//! Console access for supervised servers.
//!
//! Output is read back from the active console log named by the pointer file
//! ([`tail`]). Input goes to the stdin pipe kept open at launch
//! ([`ConsoleInputs`]); only servers launched by this supervisor instance have
//! one.
use crate::error::{Error, Result};
use crate::server::runtime::RuntimeFiles;
use async_process::ChildStdin;
use futures_lite::io::AsyncWriteExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Returns at most the last `max_lines` lines of the active console log.
///
/// A server that never started has no pointer file and yields an empty
/// sequence, as does a pointer naming a log that no longer exists. I/O errors
/// are reported as a single synthetic line so a status view never breaks on
/// console retrieval.
pub async fn tail(files: &RuntimeFiles, max_lines: usize) -> Vec<String> {
    match read_tail(files, max_lines).await {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read console log");
            vec![format!("Error reading console: {}", e)]
        }
    }
}

async fn read_tail(files: &RuntimeFiles, max_lines: usize) -> Result<Vec<String>> {
    let Some(log_path) = files.read_pointer().await? else {
        return Ok(Vec::new());
    };

    let bytes = match tokio::fs::read(&log_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(last_lines(&String::from_utf8_lossy(&bytes), max_lines))
}

fn last_lines(content: &str, max_lines: usize) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let skip = lines.len().saturating_sub(max_lines);
    lines[skip..].iter().map(|line| line.to_string()).collect()
}

struct ConsoleInput {
    pid: u32,
    stdin: Arc<tokio::sync::Mutex<ChildStdin>>,
}

/// Stdin pipes of the servers launched by this supervisor, keyed by server id.
#[derive(Default)]
pub struct ConsoleInputs {
    inputs: Mutex<HashMap<String, ConsoleInput>>,
}

impl ConsoleInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers the stdin of a freshly launched process, replacing any older one.
    pub fn register(&self, id: &str, pid: u32, stdin: ChildStdin) -> Result<()> {
        let mut inputs = self
            .inputs
            .lock()
            .map_err(|_| Error::Other("Failed to lock console inputs".to_string()))?;
        inputs.insert(
            id.to_string(),
            ConsoleInput {
                pid,
                stdin: Arc::new(tokio::sync::Mutex::new(stdin)),
            },
        );
        Ok(())
    }

    /// Drops the stdin of a server, closing the pipe.
    pub fn release(&self, id: &str) -> Result<()> {
        let mut inputs = self
            .inputs
            .lock()
            .map_err(|_| Error::Other("Failed to lock console inputs".to_string()))?;
        inputs.remove(id);
        Ok(())
    }

    /// Writes one command line to the server whose live process is `pid`.
    ///
    /// Fails if this supervisor holds no pipe for that exact process, which
    /// happens after a supervisor restart or if the PID was reused.
    pub async fn send(&self, id: &str, pid: u32, command: &str) -> Result<()> {
        let stdin = {
            let inputs = self
                .inputs
                .lock()
                .map_err(|_| Error::Other("Failed to lock console inputs".to_string()))?;
            match inputs.get(id) {
                Some(input) if input.pid == pid => Arc::clone(&input.stdin),
                _ => {
                    return Err(Error::Process(format!(
                        "No console input for server '{}' (PID {}); it was not launched by this supervisor",
                        id, pid
                    )));
                }
            }
        };

        let mut line = command.trim_end_matches(['\r', '\n']).to_string();
        line.push('\n');

        let mut stdin = stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Io(format!("Failed to write console command: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::Io(format!("Failed to flush console command: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_lines() {
        let content = "one\ntwo\nthree\n";
        assert_eq!(last_lines(content, 2), vec!["two", "three"]);
        assert_eq!(last_lines(content, 3), vec!["one", "two", "three"]);
        assert_eq!(last_lines(content, 10), vec!["one", "two", "three"]);
        assert!(last_lines(content, 0).is_empty());
        assert!(last_lines("", 5).is_empty());
    }

    #[test]
    fn test_last_lines_without_trailing_newline() {
        assert_eq!(last_lines("a\r\nb", 5), vec!["a", "b"]);
    }
}
