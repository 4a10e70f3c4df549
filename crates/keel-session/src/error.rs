//! Error types for session operations.
//!
//! The session core has no failure modes of its own; every variant here
//! carries a failure raised by a collaborator (store, scheduler, connection)
//! or by configuration loading.

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session store failed to load, save or remove a record.
    #[error("Session store error: {0}")]
    Store(String),

    /// The scheduler could not accept an expiration task.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Closing the bound connection failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
