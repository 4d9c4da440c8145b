//! Configuration module for MC Runner.
//!
//! This module handles parsing, validation, persistence and access to the
//! server definitions and directory settings. Configurations are JSON
//! documents loaded at startup and saved explicitly after each mutation.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use mc_runner::config::Config;
//!
//! let config = Config::from_file("config.json").unwrap();
//! println!("Loaded configuration with {} servers", config.servers.len());
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use mc_runner::{McRunner, config::{Config, ServerDefinition}};
//!
//! let mut config = Config::default();
//! let mut survival = ServerDefinition::new("Survival", "/srv/minecraft/survival");
//! survival.memory = "4G".to_string();
//! config.servers.insert("survival".to_string(), survival);
//!
//! let runner = McRunner::new(config)?;
//! # Ok::<(), mc_runner::Error>(())
//! ```
mod parser;
pub mod validator;

pub use parser::{Config, ServerDefinition, StopPolicy};
pub use validator::validate_config;
