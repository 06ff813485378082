//! Configuration module for the junction runtime.
//!
//! YAML-based configuration loading with environment variable expansion,
//! covering the server bind address and logging options.

pub mod loader;
pub mod schema;

pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    JunctionConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ServerConfig,
};
