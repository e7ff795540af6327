//! Error taxonomy for cart operations.

use thiserror::Error;

use crate::model::ItemId;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Request could not be sent or the connection failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success HTTP status.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response body was not the expected JSON envelope.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Server processed the request and refused it (`success: false`).
    #[error("{message}")]
    Application {
        /// Message from the server envelope, if any.
        message: String,
    },

    /// Session is not authenticated; the server redirected to sign-in.
    #[error("Authentication required")]
    AuthRequired {
        /// Redirect target reported by the server, if any.
        location: Option<String>,
    },

    /// The cache has no line for an item the operation expected to find.
    #[error("No cart line for item {item_id}")]
    MissingLine {
        /// Item that could not be found.
        item_id: ItemId,
    },
}

/// Coarse grouping that decides how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport, status or body failures: banner with a generic message.
    NetworkFailure,
    /// Server-side refusal: banner with the server message.
    ApplicationError,
    /// Redirect to sign-in, no banner.
    AuthRequired,
    /// Local cache out of step with the page: logged only.
    DomInconsistency,
}

impl CartError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::Network(_) | CartError::Status { .. } | CartError::Parse(_) => {
                ErrorKind::NetworkFailure
            }
            CartError::Application { .. } => ErrorKind::ApplicationError,
            CartError::AuthRequired { .. } => ErrorKind::AuthRequired,
            CartError::MissingLine { .. } => ErrorKind::DomInconsistency,
        }
    }

    /// Banner text: the server message when there is one, `fallback` otherwise.
    pub fn banner_message(&self, fallback: &str) -> String {
        match self {
            CartError::Application { message } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// Result type for cart operations.
pub type CartResult<T> = Result<T, CartError>;
