//! Configuration module for the gallery-downloader.
//!
//! This module handles:
//! - Loading configuration from TOML files
//! - CLI argument parsing and merging
//! - Configuration validation

pub mod loader;
pub mod validation;

pub use loader::{
    Config, OptionsConfig, PoolConfig, RateLimitConfig, SessionConfig, SourcesConfig,
};
pub use validation::validate_config;
