use thiserror::Error;

/// Core error types for docrules data handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Invalid field path: {0}")]
    InvalidFieldPath(String),

    #[error("Invalid field value: {message}")]
    InvalidValue { message: String },

    #[error("Malformed write request: {message}")]
    MalformedRequest { message: String },
}

impl CoreError {
    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(message: impl Into<String>) -> Self {
        Self::InvalidTimestamp(message.into())
    }

    /// Create a new InvalidPath error
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath(message.into())
    }

    /// Create a new InvalidFieldPath error
    pub fn invalid_field_path(message: impl Into<String>) -> Self {
        Self::InvalidFieldPath(message.into())
    }

    /// Create a new InvalidValue error
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }

    /// Create a new MalformedRequest error
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
