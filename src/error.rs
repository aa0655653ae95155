use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum StatekitError {
    RegistryError(String),
    StorageError(String),
    TransportError(String),
    SyncError(String),
    ConfigurationError(String),
}

impl fmt::Display for StatekitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatekitError::RegistryError(msg) => write!(f, "Registry error: {msg}"),
            StatekitError::StorageError(msg) => write!(f, "Storage error: {msg}"),
            StatekitError::TransportError(msg) => write!(f, "Transport error: {msg}"),
            StatekitError::SyncError(msg) => write!(f, "Sync error: {msg}"),
            StatekitError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for StatekitError {}

impl From<crate::registry::RegistryError> for StatekitError {
    fn from(err: crate::registry::RegistryError) -> Self {
        StatekitError::RegistryError(err.to_string())
    }
}

impl From<crate::storage::StorageError> for StatekitError {
    fn from(err: crate::storage::StorageError) -> Self {
        StatekitError::StorageError(err.to_string())
    }
}

impl From<crate::dispatch::TransportError> for StatekitError {
    fn from(err: crate::dispatch::TransportError) -> Self {
        StatekitError::TransportError(err.to_string())
    }
}

impl From<crate::sync::SyncError> for StatekitError {
    fn from(err: crate::sync::SyncError) -> Self {
        StatekitError::SyncError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StatekitError>;
