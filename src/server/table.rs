//! Access to the operating-system process table.
//!
//! Everything the supervisor knows about a live process goes through the
//! [`ProcessTable`] trait: whether a PID is alive, how much CPU and memory it
//! uses, and delivering shutdown signals. [`SystemProcessTable`] is the real
//! implementation; tests substitute their own.
use crate::error::{Error, Result};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

/// What the process table says about a PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The process exists and has not terminated.
    Alive,
    /// The process terminated but has not been reaped.
    Zombie,
    /// No process with this PID exists.
    Missing,
}

impl ProcessState {
    /// Only an alive process counts as running; zombies are already dead.
    pub fn is_alive(self) -> bool {
        self == ProcessState::Alive
    }
}

/// Signals used by the escalating shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Cooperative termination (SIGTERM).
    Terminate,
    /// Forced termination (SIGKILL).
    Kill,
}

/// Resource usage of a live process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessUsage {
    /// CPU usage in percent of one core, sampled over a short interval.
    pub cpu_percent: f32,
    /// Resident set size in bytes.
    pub rss_bytes: u64,
}

impl ProcessUsage {
    pub fn memory_mb(&self) -> f64 {
        self.rss_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Inspection and signalling of OS processes by PID.
pub trait ProcessTable: Send + Sync {
    /// Looks up the PID in the process table.
    fn state(&self, pid: u32) -> ProcessState;

    /// Samples CPU and memory of a live process. May block for the sample interval.
    fn sample(&self, pid: u32) -> Result<ProcessUsage>;

    /// Delivers a signal. A PID that no longer exists is not an error.
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()>;
}

/// [`ProcessTable`] backed by `sysinfo` for inspection and `nix` for signals.
#[derive(Debug, Clone)]
pub struct SystemProcessTable {
    sample_interval: Duration,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            sample_interval: Duration::from_millis(100),
        }
    }

    /// Overrides the CPU sampling window. Never shorter than what `sysinfo` can measure.
    pub fn with_sample_interval(sample_interval: Duration) -> Self {
        Self { sample_interval }
    }

    fn refresh(system: &mut System, pid: Pid, kind: ProcessRefreshKind) {
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, kind);
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn state(&self, pid: u32) -> ProcessState {
        let mut system = System::new();
        let pid = Pid::from_u32(pid);
        Self::refresh(&mut system, pid, ProcessRefreshKind::new());

        match system.process(pid) {
            None => ProcessState::Missing,
            Some(process) => match process.status() {
                ProcessStatus::Zombie | ProcessStatus::Dead => ProcessState::Zombie,
                _ => ProcessState::Alive,
            },
        }
    }

    fn sample(&self, pid: u32) -> Result<ProcessUsage> {
        let mut system = System::new();
        let sys_pid = Pid::from_u32(pid);
        let kind = ProcessRefreshKind::new().with_cpu().with_memory();

        // cpu usage is the delta between two refreshes
        Self::refresh(&mut system, sys_pid, kind);
        std::thread::sleep(self.sample_interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        Self::refresh(&mut system, sys_pid, kind);

        let process = system
            .process(sys_pid)
            .ok_or_else(|| Error::Inspection(format!("process {} disappeared", pid)))?;

        Ok(ProcessUsage {
            cpu_percent: process.cpu_usage(),
            rss_bytes: process.memory(),
        })
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid as NixPid;

        // 0 and negative values address process groups
        let raw = i32::try_from(pid)
            .ok()
            .filter(|raw| *raw > 0)
            .ok_or_else(|| Error::Process(format!("invalid PID {}", pid)))?;

        let sig = match signal {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };

        match signal::kill(NixPid::from_raw(raw), sig) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => {
                tracing::debug!(pid, ?signal, "Process already gone when signalled");
                Ok(())
            }
            Err(e) => Err(Error::Process(format!(
                "Failed to send {} to PID {}: {}",
                sig, pid, e
            ))),
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()> {
        let mut system = System::new();
        let sys_pid = Pid::from_u32(pid);
        Self::refresh(&mut system, sys_pid, ProcessRefreshKind::new());

        let Some(process) = system.process(sys_pid) else {
            return Ok(());
        };
        let sig = match signal {
            StopSignal::Terminate => sysinfo::Signal::Term,
            StopSignal::Kill => sysinfo::Signal::Kill,
        };
        match process.kill_with(sig) {
            Some(true) => Ok(()),
            // no graceful signal on this platform
            None => {
                if process.kill() {
                    Ok(())
                } else {
                    Err(Error::Process(format!("Failed to kill PID {}", pid)))
                }
            }
            Some(false) => Err(Error::Process(format!(
                "Failed to send {:?} to PID {}",
                signal, pid
            ))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        let table = SystemProcessTable::new();
        assert_eq!(table.state(std::process::id()), ProcessState::Alive);
    }

    #[test]
    fn test_reaped_child_is_missing() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let table = SystemProcessTable::new();
        assert_eq!(table.state(pid), ProcessState::Missing);
    }

    #[test]
    fn test_unreaped_child_is_zombie() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        // let it exit without reaping
        std::thread::sleep(Duration::from_millis(300));

        let table = SystemProcessTable::new();
        assert_eq!(table.state(pid), ProcessState::Zombie);
        assert!(!table.state(pid).is_alive());

        child.wait().unwrap();
    }

    #[test]
    fn test_signal_missing_pid_is_ok() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let table = SystemProcessTable::new();
        assert!(table.signal(pid, StopSignal::Terminate).is_ok());
    }

    #[test]
    fn test_signal_rejects_pid_zero() {
        let table = SystemProcessTable::new();
        assert!(matches!(
            table.signal(0, StopSignal::Kill),
            Err(Error::Process(_))
        ));
    }

    #[test]
    fn test_sample_current_process() {
        let table = SystemProcessTable::new();
        let usage = table.sample(std::process::id()).unwrap();
        assert!(usage.rss_bytes > 0);
        assert!(usage.memory_mb() > 0.0);
    }
}
