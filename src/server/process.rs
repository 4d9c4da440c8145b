// src/server/process.rs
use crate::config::ServerDefinition;
use crate::error::{Error, Result};
use async_process::{Child, ChildStdin, Command, Stdio};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Launch invocation for a server's jar.
///
/// The heap size is applied to both the minimum and the maximum so the JVM
/// reserves its memory up front, and `nogui` keeps the server console-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Java executable
    pub program: String,
    /// Arguments in order
    pub args: Vec<OsString>,
    /// Working directory of the process
    pub working_dir: PathBuf,
}

impl LaunchCommand {
    /// Builds the invocation for `definition`, pointing at the jar by absolute path.
    pub fn build(java: &str, definition: &ServerDefinition, jar: &Path) -> Self {
        let mut args: Vec<OsString> = vec![
            format!("-Xmx{}", definition.memory).into(),
            format!("-Xms{}", definition.memory).into(),
        ];
        args.extend(definition.java_args.iter().map(OsString::from));
        args.push("-jar".into());
        args.push(jar.as_os_str().to_owned());
        args.push("nogui".into());

        Self {
            program: java.to_string(),
            args,
            working_dir: definition.path.clone(),
        }
    }
}

/// A freshly spawned server process
pub struct ServerProcess {
    /// Child process, reaped in the background once dropped
    child: Child,
    /// Process id
    pid: u32,
    /// Log file receiving stdout and stderr
    log_path: PathBuf,
}

impl ServerProcess {
    /// Spawns the command detached from the supervisor's process group.
    ///
    /// Stdout and stderr are appended to `log_path`; stdin stays piped so
    /// console commands can be written to it later.
    pub fn spawn(command: &LaunchCommand, log_path: &Path) -> Result<Self> {
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| Error::Io(format!("Failed to open {}: {}", log_path.display(), e)))?;
        let err_log = log.try_clone()?;

        let mut inner = std::process::Command::new(&command.program);
        inner.args(&command.args).current_dir(&command.working_dir);

        // own process group, so a Ctrl-C aimed at the supervisor never reaches the server
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            inner.process_group(0);
        }

        let mut cmd = Command::from(inner);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log))
            .kill_on_drop(false)
            .reap_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::Process(format!("Failed to start server: {}", e)))?;
        let pid = child.id();

        Ok(Self {
            child,
            pid,
            log_path: log_path.to_path_buf(),
        })
    }

    /// Get the process id
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the console log path
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Take the stdin pipe from the process
    pub fn take_stdin(&mut self) -> Result<ChildStdin> {
        self.child.stdin.take().ok_or_else(|| {
            Error::Process("Failed to get stdin pipe from child process".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_command_args() {
        let mut definition = ServerDefinition::new("alpha", "/srv/mc/alpha");
        definition.memory = "1G".to_string();
        definition.java_args = vec!["-XX:+UseG1GC".to_string()];

        let command = LaunchCommand::build("java", &definition, Path::new("/srv/mc/alpha/server.jar"));

        assert_eq!(command.program, "java");
        assert_eq!(command.working_dir, PathBuf::from("/srv/mc/alpha"));
        assert_eq!(
            command.args,
            vec![
                OsString::from("-Xmx1G"),
                OsString::from("-Xms1G"),
                OsString::from("-XX:+UseG1GC"),
                OsString::from("-jar"),
                OsString::from("/srv/mc/alpha/server.jar"),
                OsString::from("nogui"),
            ]
        );
    }
}
