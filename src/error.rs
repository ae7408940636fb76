//! Error types for the Buddy provider.

use thiserror::Error;

/// Errors that can occur while serving a provider RPC.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is missing or has invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No handler is registered for the resource kind or function token.
    #[error("Unsupported kind: {0}")]
    UnsupportedKind(String),

    /// A resource id could not be decoded.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Diff was called for a urn that was never checked.
    #[error("No prior check for urn: {0}")]
    NoPriorCheck(String),

    /// The Buddy API rejected a request with a status we do not map further.
    #[error("Buddy API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error text returned by the API.
        message: String,
    },

    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnsupportedKind(msg) => msg,
            Self::InvalidIdentifier(msg) => msg,
            Self::NoPriorCheck(msg) => msg,
            Self::Api { message, .. } => message,
            Self::Http(_err) => "http error (see Debug output)",
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Map a non-success HTTP status from the Buddy API to an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pulumi_resource_buddy::ProviderError;
    ///
    /// let err = ProviderError::from_status(404, "Project not found".to_string());
    /// assert!(err.is_not_found());
    /// ```
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest(message),
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            429 => Self::ResourceExhausted(message),
            500..=599 => Self::Unavailable(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether this error means the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnsupportedKind(msg) => {
                tonic::Status::unimplemented(format!("Unsupported kind: {}", msg))
            }
            ProviderError::InvalidIdentifier(msg) => {
                tonic::Status::invalid_argument(format!("Invalid identifier: {}", msg))
            }
            ProviderError::NoPriorCheck(urn) => {
                tonic::Status::failed_precondition(format!("No prior check for urn: {}", urn))
            }
            ProviderError::Api { status, message } => {
                tonic::Status::unknown(format!("Buddy API error ({}): {}", status, message))
            }
            ProviderError::Http(err) => {
                tonic::Status::unavailable(format!("HTTP error: {}", err))
            }
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            }
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            }
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}
