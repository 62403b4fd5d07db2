//! Error types for the session service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific session scenarios
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No registry record for connection: {conn_id}")]
    MissingRecord { conn_id: String },

    #[error("Connection {conn_id} is not in a game room")]
    NotInRoom { conn_id: String },

    #[error("Invalid challenge target: {reason}")]
    InvalidChallengeTarget { reason: String },

    #[error("Invalid client event: {reason}")]
    InvalidClientEvent { reason: String },

    #[error("Transport send failed: {message}")]
    TransportFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
