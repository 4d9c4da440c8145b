//! Flat success/message results for a transport layer.
//!
//! Each supervisor operation has a typed `Result`; [`Outcome`] collapses it
//! into the `(success, message)` pair an HTTP handler or UI can show as is.
use crate::error::Result;
use crate::server::StopOutcome;
use serde::Serialize;
use std::fmt;

/// Success flag plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl<T: fmt::Display> From<Result<T>> for Outcome {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::success(value.to_string()),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// A server was launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub id: String,
    pub pid: u32,
}

impl fmt::Display for Started {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Server '{}' started successfully (PID: {})", self.id, self.pid)
    }
}

/// A server was shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stopped {
    pub id: String,
    pub outcome: StopOutcome,
}

impl fmt::Display for Stopped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            StopOutcome::Graceful => write!(f, "Server '{}' stopped successfully", self.id),
            StopOutcome::Forced => write!(
                f,
                "Server '{}' stopped successfully (killed after ignoring termination)",
                self.id
            ),
        }
    }
}

/// A backup snapshot was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCreated {
    pub name: String,
}

impl fmt::Display for BackupCreated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backup created: {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<Started> = Ok(Started {
            id: "alpha".to_string(),
            pid: 4242,
        });
        let outcome = Outcome::from(ok);
        assert!(outcome.success);
        assert_eq!(outcome.message, "Server 'alpha' started successfully (PID: 4242)");

        let missing: Result<Started> = Err(Error::ServerNotFound("ghost".to_string()));
        let outcome = Outcome::from(missing);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Server 'ghost' not found in configuration");
    }

    #[test]
    fn test_stopped_messages() {
        let graceful = Stopped {
            id: "alpha".to_string(),
            outcome: StopOutcome::Graceful,
        };
        assert_eq!(graceful.to_string(), "Server 'alpha' stopped successfully");

        let forced = Stopped {
            id: "alpha".to_string(),
            outcome: StopOutcome::Forced,
        };
        assert!(forced.to_string().contains("killed"));
    }
}
