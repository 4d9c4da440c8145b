use mc_runner::config::{Config, ServerDefinition};
use mc_runner::error::{Error, Result};
use mc_runner::{McRunner, Outcome};
use std::path::Path;

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.servers_dir = dir.join("servers");
    config.backups_dir = dir.join("backups");
    config
}

#[tokio::test]
async fn test_unknown_server_is_refused_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let runner = McRunner::new(config_in(dir.path())).unwrap();

    assert!(!runner.is_running("ghost").await);
    assert!(matches!(runner.start_server("ghost").await, Err(Error::ServerNotFound(_))));
    assert!(matches!(runner.stop_server("ghost").await, Err(Error::ServerNotFound(_))));
    assert!(matches!(runner.restart_server("ghost").await, Err(Error::ServerNotFound(_))));
    assert!(matches!(runner.get_server_status("ghost").await, Err(Error::ServerNotFound(_))));
    assert!(matches!(runner.get_console_output("ghost", 5).await, Err(Error::ServerNotFound(_))));
    assert!(matches!(runner.send_command("ghost", "list").await, Err(Error::ServerNotFound(_))));
    assert!(matches!(runner.create_backup("ghost").await, Err(Error::ServerNotFound(_))));
    assert!(matches!(runner.list_backups(Some("ghost")).await, Err(Error::ServerNotFound(_))));

    let outcome = Outcome::from(runner.start_server("ghost").await);
    assert!(!outcome.success);
    assert_eq!(outcome.message, "Server 'ghost' not found in configuration");

    // nothing was created on disk
    assert!(!dir.path().join("servers").exists());
    assert!(!dir.path().join("backups").exists());
}

#[tokio::test]
async fn test_stopped_server_operations() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = McRunner::new(config_in(dir.path()))?;
    runner.add_server("alpha", ServerDefinition::new("", ""))?;

    let definition = runner.server_definition("alpha")?;
    assert_eq!(definition.name, "alpha");
    assert_eq!(definition.path, dir.path().join("servers").join("alpha"));

    assert!(matches!(runner.stop_server("alpha").await, Err(Error::NotRunning(_))));
    assert!(matches!(runner.send_command("alpha", "list").await, Err(Error::NotRunning(_))));
    assert!(runner.get_console_output("alpha", 5).await?.is_empty());
    assert!(runner.list_backups(Some("alpha")).await?.is_empty());
    assert!(runner.server_events("alpha", None)?.is_empty());

    let statuses = runner.list_statuses().await?;
    assert_eq!(statuses.len(), 1);
    assert!(!statuses[0].running);

    assert!(runner.stop_all_servers().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_backup_through_runner() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = McRunner::new(config_in(dir.path()))?;
    runner.add_server("alpha", ServerDefinition::new("Alpha", ""))?;

    let missing = Outcome::from(runner.create_backup("alpha").await);
    assert!(!missing.success);
    assert!(missing.message.contains("Server directory not found"));

    let server_dir = dir.path().join("servers/alpha");
    std::fs::create_dir_all(&server_dir).unwrap();
    std::fs::write(server_dir.join("server.properties"), "motd=hi\n").unwrap();

    let created = runner.create_backup("alpha").await?;
    assert!(created.to_string().starts_with("Backup created: alpha_"));

    let backups = runner.list_backups(Some("alpha")).await?;
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].name, created.name);
    assert_eq!(runner.list_backups(None).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_definition_changes_are_saved() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{ "servers_dir": {:?}, "backups_dir": {:?} }}"#,
            dir.path().join("servers"),
            dir.path().join("backups")
        ),
    )
    .unwrap();

    let runner = McRunner::from_config_file(&config_path)?;
    runner.add_server("alpha", ServerDefinition::new("Alpha", ""))?;
    assert!(matches!(
        runner.add_server("alpha", ServerDefinition::new("Again", "")),
        Err(Error::ConfigInvalid(_))
    ));

    let mut bad = ServerDefinition::new("Bad", "");
    bad.memory = "lots".to_string();
    assert!(matches!(runner.add_server("bad", bad), Err(Error::ConfigInvalid(_))));
    assert!(matches!(
        runner.add_server("../escape", ServerDefinition::new("Escape", "")),
        Err(Error::ConfigInvalid(_))
    ));

    let mut updated = runner.server_definition("alpha")?;
    updated.memory = "4G".to_string();
    runner.update_server("alpha", updated).await?;

    let reloaded = Config::from_file(&config_path)?;
    assert_eq!(reloaded.servers.len(), 1);
    assert_eq!(reloaded.servers["alpha"].memory, "4G");
    assert_eq!(reloaded.servers["alpha"].name, "Alpha");

    runner.remove_server("alpha").await?;
    assert!(Config::from_file(&config_path)?.servers.is_empty());
    assert!(matches!(runner.remove_server("alpha").await, Err(Error::ServerNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_running_server_cannot_be_moved_or_removed() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = McRunner::new(config_in(dir.path()))?;
    runner.add_server("alpha", ServerDefinition::new("Alpha", ""))?;

    // the test process itself stands in for a running server
    let server_dir = dir.path().join("servers/alpha");
    std::fs::create_dir_all(&server_dir).unwrap();
    std::fs::write(server_dir.join("server.pid"), std::process::id().to_string()).unwrap();
    assert!(runner.is_running("alpha").await);

    let mut moved = runner.server_definition("alpha")?;
    moved.path = dir.path().join("elsewhere");
    assert!(matches!(runner.update_server("alpha", moved).await, Err(Error::AlreadyRunning(_))));

    let mut renumbered = runner.server_definition("alpha")?;
    renumbered.port = 25570;
    assert!(matches!(
        runner.update_server("alpha", renumbered).await,
        Err(Error::AlreadyRunning(_))
    ));

    let mut renamed = runner.server_definition("alpha")?;
    renamed.name = "Alpha Prime".to_string();
    runner.update_server("alpha", renamed).await?;
    assert_eq!(runner.server_definition("alpha")?.name, "Alpha Prime");

    assert!(matches!(runner.remove_server("alpha").await, Err(Error::AlreadyRunning(_))));
    assert!(matches!(runner.start_server("alpha").await, Err(Error::AlreadyRunning(_))));

    // leave the test process alone
    std::fs::remove_file(server_dir.join("server.pid")).unwrap();
    Ok(())
}

#[test]
fn test_invalid_config_string_is_rejected() {
    assert!(matches!(
        McRunner::from_config_str(r#"{ "java_path": "" }"#),
        Err(Error::ConfigInvalid(_))
    ));
    assert!(matches!(McRunner::from_config_str("nope"), Err(Error::ConfigParse(_))));
}

#[tokio::test]
async fn test_running_server_keeps_custom_path_when_path_is_omitted() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = McRunner::new(config_in(dir.path()))?;
    let custom = dir.path().join("custom-location");
    runner.add_server("alpha", ServerDefinition::new("Alpha", &custom))?;

    std::fs::create_dir_all(&custom).unwrap();
    std::fs::write(custom.join("server.pid"), std::process::id().to_string()).unwrap();
    assert!(runner.is_running("alpha").await);

    // an empty path would default to <servers_dir>/alpha, which moves the server
    let mut defaulted = runner.server_definition("alpha")?;
    defaulted.path = "".into();
    assert!(matches!(
        runner.update_server("alpha", defaulted).await,
        Err(Error::AlreadyRunning(_))
    ));
    assert_eq!(runner.server_definition("alpha")?.path, custom);
    assert!(runner.is_running("alpha").await);

    std::fs::remove_file(custom.join("server.pid")).unwrap();
    Ok(())
}

#[tokio::test]
async fn test_failed_save_leaves_configuration_unchanged() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("etc");
    std::fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("config.json");

    let runner = McRunner::from_config_file(&config_path)?;
    runner.add_server("alpha", ServerDefinition::new("Alpha", dir.path().join("alpha")))?;

    // the config directory disappears, so every save fails
    std::fs::remove_dir_all(&config_dir).unwrap();

    let added = runner.add_server("beta", ServerDefinition::new("Beta", dir.path().join("beta")));
    assert!(matches!(added, Err(Error::Io(_))));
    assert!(matches!(runner.server_definition("beta"), Err(Error::ServerNotFound(_))));

    let mut updated = runner.server_definition("alpha")?;
    updated.memory = "8G".to_string();
    assert!(runner.update_server("alpha", updated).await.is_err());
    assert_eq!(runner.server_definition("alpha")?.memory, "2G");

    assert!(runner.remove_server("alpha").await.is_err());
    assert!(runner.server_definition("alpha").is_ok());
    Ok(())
}

#[test]
fn test_programmatic_config_is_validated() {
    let mut config = Config::default();
    config.stop.poll_interval_ms = 0;
    assert!(matches!(McRunner::new(config), Err(Error::ConfigInvalid(_))));

    let mut config = Config::default();
    let mut definition = ServerDefinition::new("Alpha", "/srv/alpha");
    definition.memory = "lots".to_string();
    config.servers.insert("alpha".to_string(), definition);
    assert!(matches!(McRunner::new(config), Err(Error::ConfigInvalid(_))));
}
