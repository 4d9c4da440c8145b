use crate::config::ServerDefinition;
use crate::error::{Error, Result};
use crate::server::liveness::LivenessChecker;
use crate::server::runtime::RuntimeFiles;
use serde::Serialize;
use std::path::PathBuf;

/// Point-in-time status of one server.
///
/// The base fields are always present. `pid`, `cpu_percent` and `memory_mb`
/// are filled in only for a running server whose process could be inspected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatusReport {
    pub id: String,
    pub name: String,
    pub running: bool,
    pub path: PathBuf,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
}

/// Builds the status of a server, sampling CPU and memory when it runs.
///
/// Only inspection failures are tolerated: they leave the usage figures
/// empty. Any other error is returned.
#[tracing::instrument(skip(liveness, definition), fields(server_id = %id))]
pub async fn collect(
    liveness: &LivenessChecker,
    id: &str,
    definition: &ServerDefinition,
) -> Result<ServerStatusReport> {
    let files = RuntimeFiles::for_server(definition);
    let pid = liveness.running_pid(id, &files).await;

    let mut report = ServerStatusReport {
        id: id.to_string(),
        name: definition.name.clone(),
        running: pid.is_some(),
        path: definition.path.clone(),
        port: definition.port,
        pid,
        cpu_percent: None,
        memory_mb: None,
    };

    if let Some(pid) = pid {
        let table = liveness.table().clone();
        let sampled = tokio::task::spawn_blocking(move || table.sample(pid))
            .await
            .map_err(|e| Error::Other(format!("Sampling task failed: {}", e)))?;

        match sampled {
            Ok(usage) => {
                report.cpu_percent = Some(usage.cpu_percent);
                report.memory_mb = Some(usage.memory_mb());
            }
            Err(Error::Inspection(reason)) => {
                tracing::debug!(pid, %reason, "Skipping resource usage");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}
