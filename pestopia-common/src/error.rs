//! Common error types for Pestopia

use thiserror::Error;

/// Common result type for Pestopia operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Pestopia services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
