//! Configuration module for the Colloquy runtime.
//!
//! Layered loading (defaults, files, `COLLOQUY_*` environment variables and
//! programmatic overrides) plus validation of logging, dialog and storage
//! settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ColloquyConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SpanEventConfig,
    StorageBackend, StorageConfig,
};
pub use validation::validate_config;
