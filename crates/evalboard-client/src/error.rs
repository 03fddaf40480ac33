use evalboard_types::ErrorBody;
use http::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;
use crate::transport::TransportError;

/// Where an error should be surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input or credentials; rendered inline on the form.
    Validation,
    /// Session is gone; refresh or re-login.
    AuthExpired,
    /// Server error, timeout or no response; worth retrying later.
    Transient,
    RateLimited,
    NotFound,
    /// Any other business error the calling view renders itself.
    Domain,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("Your session has expired. Please log in again.")]
    SessionExpired,

    #[error("token storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// Builds an HTTP error from a non-success status and its raw body.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
        ClientError::Http { status, message }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ClientError::Http { status, .. } => match *status {
                StatusCode::UNAUTHORIZED => ErrorClass::AuthExpired,
                StatusCode::TOO_MANY_REQUESTS => ErrorClass::RateLimited,
                StatusCode::NOT_FOUND => ErrorClass::NotFound,
                StatusCode::BAD_REQUEST
                | StatusCode::UNPROCESSABLE_ENTITY
                | StatusCode::CONFLICT
                | StatusCode::FORBIDDEN => ErrorClass::Validation,
                s if s.is_server_error() => ErrorClass::Transient,
                _ => ErrorClass::Domain,
            },
            ClientError::Timeout | ClientError::Network(_) => ErrorClass::Transient,
            ClientError::NoRefreshToken
            | ClientError::NotAuthenticated
            | ClientError::SessionExpired => ErrorClass::AuthExpired,
            ClientError::Decode(_) | ClientError::Storage(_) => ErrorClass::Domain,
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ClientError::Timeout,
            TransportError::Connect(msg) | TransportError::Other(msg) => ClientError::Network(msg),
        }
    }
}
