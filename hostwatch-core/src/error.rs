use thiserror::Error;

/// Errors raised while setting up the sampling engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to initialize tracing: {0}")]
    Tracing(String),
}

pub type Result<T> = std::result::Result<T, Error>;
