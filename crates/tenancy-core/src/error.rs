use thiserror::Error;

/// Core error types for the resource model
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid resource kind: {0}")]
    InvalidKind(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid resource data: {message}")]
    InvalidResource { message: String },

    #[error("Object {kind}/{name} has no uid and cannot own other objects")]
    MissingUid { kind: String, name: String },
}

impl CoreError {
    /// Create a new InvalidKind error
    pub fn invalid_kind(kind: impl Into<String>) -> Self {
        Self::InvalidKind(kind.into())
    }

    /// Create a new InvalidResource error
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Create a new MissingUid error
    pub fn missing_uid(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingUid {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
