//! Configuration management for the tempo-hall service
//!
//! This module handles all configuration loading from environment variables
//! or a TOML file, validation, and default values for the session service.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings, SessionSettings};
