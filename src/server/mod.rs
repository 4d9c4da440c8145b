/// Server management module for MC Runner.
///
/// This module handles the lifecycle, liveness and monitoring of Minecraft
/// server processes. State that must survive a supervisor restart lives on
/// disk (see [`runtime`]); everything else is re-derived from the OS process
/// table on demand.
/// All public components are instrumented with `tracing` spans.
///
/// # Components
///
/// * `table` - OS process table access (inspection and signals)
/// * `runtime` - PID file, pointer file and console log layout
/// * `liveness` - "is it really running?" with stale PID cleanup
/// * `process` - Launch command construction and detached spawning
/// * `lifecycle` - Start/stop state machine and lifecycle event history
/// * `monitor` - Periodic liveness sweeps and optional auto-restart
/// * `status` - Status reports with CPU and memory sampling
///
/// # Examples
///
/// Checking liveness directly:
///
/// ```no_run
/// use mc_runner::server::{LivenessChecker, RuntimeFiles, SystemProcessTable};
/// use std::sync::Arc;
///
/// # async fn demo() {
/// let liveness = LivenessChecker::new(Arc::new(SystemProcessTable::new()));
/// let files = RuntimeFiles::new("/srv/minecraft/survival");
/// if liveness.is_running("survival", &files).await {
///     println!("survival is up");
/// }
/// # }
/// ```
pub mod lifecycle;
pub mod liveness;
pub mod monitor;
mod process;
pub mod runtime;
pub mod status;
pub mod table;

pub use lifecycle::{ServerEvent, ServerLifecycleEvent, ServerLifecycleManager, StopOutcome};
pub use liveness::LivenessChecker;
pub use monitor::{ServerHealth, ServerMonitor, ServerMonitorConfig};
pub use process::{LaunchCommand, ServerProcess};
pub use runtime::RuntimeFiles;
pub use status::ServerStatusReport;
pub use table::{ProcessState, ProcessTable, ProcessUsage, StopSignal, SystemProcessTable};
