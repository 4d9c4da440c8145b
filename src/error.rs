/// Error handling module for MC Runner.
///
/// This module defines the error types used throughout the library.
/// Every supervisor operation reports failures through [`Error`]; the
/// [`crate::McRunner`] facade flattens them into an [`crate::Outcome`]
/// so that a transport layer never has to handle a raised error.
///
/// # Example
///
/// ```
/// use mc_runner::error::{Error, Result};
///
/// fn handle_error(result: Result<u32>) {
///     match result {
///         Ok(pid) => println!("Server running with PID {}", pid),
///         Err(Error::ServerNotFound(id)) => println!("Server '{}' is not configured", id),
///         Err(Error::AlreadyRunning(id)) => println!("Server '{}' is already up", id),
///         Err(Error::MissingArtifact(path)) => println!("No jar at {}", path.display()),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the mc-runner library.
///
/// The first four variants are the supervisor's expected refusals; the rest
/// wrap failures of the filesystem, the process table or the configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// The server identifier has no definition in the configuration.
    #[error("Server '{0}' not found in configuration")]
    ServerNotFound(String),

    /// A start was requested while the liveness check reports the server up.
    #[error("Server '{0}' is already running")]
    AlreadyRunning(String),

    /// A stop (or console command) was requested for a server that is down.
    #[error("Server '{0}' is not running")]
    NotRunning(String),

    /// The configured jar does not exist at `<path>/<jar>`.
    #[error("Server jar not found at {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Filesystem failure during start, stop, backup or console access.
    ///
    /// This error occurs when:
    /// - The server or logs directory cannot be created
    /// - The PID or pointer file cannot be written or removed
    /// - A backup copy fails part way through
    #[error("I/O error: {0}")]
    Io(String),

    /// Error when launching or signalling a server process.
    ///
    /// This error occurs when:
    /// - The java executable cannot be spawned
    /// - A signal cannot be delivered for a reason other than the process being gone
    /// - The persisted PID is not a valid process identifier
    #[error("Server process error: {0}")]
    Process(String),

    /// Inspecting a live process (CPU, memory) failed.
    ///
    /// Status reporting treats this as non-fatal and simply omits the figures.
    #[error("Process inspection failed: {0}")]
    Inspection(String),

    /// Failed to read or parse the configuration document.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains values that fail validation.
    ///
    /// This error occurs when:
    /// - An identifier or jar name contains path separators or `..`
    /// - The memory size is not of the form `<digits>[K|M|G]`
    /// - A port is in the privileged range
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Result type for mc-runner operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error` type
/// from this module.
pub type Result<T> = std::result::Result<T, Error>;
