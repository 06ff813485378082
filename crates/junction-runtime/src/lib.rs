//! # Junction Runtime
//!
//! Orchestration layer for the junction daemon.
//!
//! This crate provides:
//! - Runtime orchestration ([`JunctionRuntime`]): bind, serve, and shut
//!   down both transport faces over one dispatcher
//! - YAML configuration with environment variable expansion
//! - Logging configuration on top of `tracing-subscriber`
//!
//! ```ignore
//! use junction_framework::Dispatcher;
//! use junction_runtime::{JunctionRuntime, RuntimeResult};
//!
//! #[tokio::main]
//! async fn main() -> RuntimeResult<()> {
//!     let mut dispatcher = Dispatcher::new();
//!     // ... register routes and services ...
//!
//!     // Loads junction.yaml when present, then serves until Ctrl+C
//!     JunctionRuntime::new(dispatcher).run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigLoader, JunctionConfig, LoggingConfig, ServerConfig};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::JunctionRuntime;
