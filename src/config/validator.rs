use crate::config::{Config, ServerDefinition};
use crate::error::{Error, Result};

/// Validates a server identifier
pub fn validate_server_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::ConfigInvalid("Server id must not be empty".to_string()));
    }
    if id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(Error::ConfigInvalid(format!(
            "Server id '{}' must not contain '/', '\\' or '..'",
            id
        )));
    }
    Ok(())
}

/// Validates a memory size such as `512M` or `2G`
pub fn validate_memory(memory: &str) -> Result<()> {
    let digits = memory.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    // at most one unit suffix
    let suffix_ok = memory.len() - digits.len() <= 1;
    if digits.is_empty() || !suffix_ok || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::ConfigInvalid(format!(
            "Memory '{}' must be a number optionally followed by K, M or G",
            memory
        )));
    }
    Ok(())
}

/// Validates a server definition
pub fn validate_server_definition(id: &str, definition: &ServerDefinition) -> Result<()> {
    validate_server_id(id)?;

    if definition.jar.is_empty() {
        return Err(Error::ConfigInvalid(format!("Server '{}' has empty jar", id)));
    }
    if definition.jar.contains('/') || definition.jar.contains("..") {
        return Err(Error::ConfigInvalid(format!(
            "Server '{}' jar must not contain '/' or '..'",
            id
        )));
    }

    validate_memory(&definition.memory)
        .map_err(|e| Error::ConfigInvalid(format!("Server '{}': {}", id, e)))?;

    if definition.port < 1024 {
        return Err(Error::ConfigInvalid(format!(
            "Server '{}' port must be between 1024 and 65535",
            id
        )));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &Config) -> Result<()> {
    if config.java_path.is_empty() {
        return Err(Error::ConfigInvalid("java_path must not be empty".to_string()));
    }
    if config.stop.poll_interval_ms == 0 {
        return Err(Error::ConfigInvalid(
            "stop.poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    for (id, definition) in &config.servers {
        validate_server_definition(id, definition)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_memory() {
        assert!(validate_memory("2G").is_ok());
        assert!(validate_memory("1536m").is_ok());
        assert!(validate_memory("1048576").is_ok());
        assert!(validate_memory("").is_err());
        assert!(validate_memory("G").is_err());
        assert!(validate_memory("2GB").is_err());
        assert!(validate_memory("two").is_err());
        assert!(validate_memory("-1G").is_err());
    }

    #[test]
    fn test_validate_server_id() {
        assert!(validate_server_id("survival-1").is_ok());
        assert!(validate_server_id("").is_err());
        assert!(validate_server_id("../etc").is_err());
        assert!(validate_server_id("a/b").is_err());
        assert!(validate_server_id("a\\b").is_err());
    }
}
