use anyhow::Context;
use mc_runner::server::{ServerMonitor, ServerMonitorConfig};
use mc_runner::{McRunner, Outcome};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=mc_runner=debug
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!("Starting supervise example");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/config.json".to_string());
    let runner = Arc::new(
        McRunner::from_config_file(&config_path)
            .with_context(|| format!("loading {}", config_path))?,
    );

    println!("Configured servers:");
    for status in runner.list_statuses().await? {
        println!(
            "- {} ({}) running={} port={} pid={:?}",
            status.id, status.name, status.running, status.port, status.pid
        );
    }

    println!("\nStarting autostart servers...");
    for (id, outcome) in runner.start_autostart_servers().await? {
        println!("{}: {}", id, outcome.message);
    }

    // Watch for crashes while the servers warm up
    let mut monitor = ServerMonitor::new(
        Arc::clone(&runner),
        ServerMonitorConfig {
            check_interval: Duration::from_secs(5),
            auto_restart: true,
            ..ServerMonitorConfig::default()
        },
    );
    monitor.start()?;

    tokio::time::sleep(Duration::from_secs(15)).await;

    for (id, _) in runner.list_servers()? {
        let status = runner.get_server_status(&id).await?;
        if !status.running {
            continue;
        }
        println!(
            "\n=== {} === cpu={:?}% memory={:?}MB",
            id, status.cpu_percent, status.memory_mb
        );
        for line in runner.get_console_output(&id, 10).await? {
            println!("  {}", line);
        }

        let said = Outcome::from(
            runner
                .send_command(&id, "say Backing up, hold on")
                .await
                .map(|_| "sent"),
        );
        println!("console command: {}", said.message);
    }

    monitor.stop()?;

    println!("\nStopping all servers...");
    for (id, outcome) in runner.stop_all_servers().await? {
        println!("{}: {}", id, outcome.message);
    }

    for (id, _) in runner.list_servers()? {
        println!("{}", Outcome::from(runner.create_backup(&id).await).message);
    }
    for backup in runner.list_backups(None).await? {
        println!("- {} {:.1} MB", backup.name, backup.size_mb);
    }

    Ok(())
}
