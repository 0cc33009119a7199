use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `IxaError` and maps other errors to an `IxaError`
///
/// `ConfigurationError` is fatal and surfaces while a scenario is being set
/// up. `NetworkError` is returned by structural operations on contact layers.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum IxaError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    ConfigurationError(String),
    NetworkError(String),
    IxaError(String),
}

impl IxaError {
    pub fn config(message: impl Into<String>) -> Self {
        IxaError::ConfigurationError(message.into())
    }
}

impl From<io::Error> for IxaError {
    fn from(error: io::Error) -> Self {
        IxaError::IoError(error)
    }
}

impl From<serde_json::Error> for IxaError {
    fn from(error: serde_json::Error) -> Self {
        IxaError::JsonError(error)
    }
}

impl From<String> for IxaError {
    fn from(error: String) -> Self {
        IxaError::IxaError(error)
    }
}

impl From<&str> for IxaError {
    fn from(error: &str) -> Self {
        IxaError::IxaError(error.to_string())
    }
}

impl std::error::Error for IxaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IxaError::IoError(error) => Some(error),
            IxaError::JsonError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for IxaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IxaError::ConfigurationError(message) => {
                write!(f, "Configuration error: {message}")
            }
            IxaError::NetworkError(message) => write!(f, "Network error: {message}"),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
