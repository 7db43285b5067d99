//! Client error taxonomy.
//!
//! Every fallible operation in the library returns [`ClientError`]. The CLI
//! turns it into a single banner line via [`ClientError::banner`].

use thiserror::Error;

use crate::validation::FieldErrors;

/// Errors surfaced to the user by the client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Client-side validation failed; no request was sent.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// No access credential is stored for the current session.
    #[error("authentication required")]
    AuthenticationRequired,

    /// A submission is already waiting on the network.
    #[error("a submission is already in progress")]
    SubmissionInProgress,

    /// The request could not be sent, or the response was not JSON.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered but reported a failure.
    #[error("api error: {message}")]
    Api { status: Option<u16>, message: String },

    /// The report was created but its media could not be attached.
    #[error("report {report_id} created, but media failed to attach: {message}")]
    PartialFailure { report_id: i64, message: String },

    /// Reading or writing local state failed.
    #[error("local storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Text for the dismissable banner shown after a failed action.
    pub fn banner(&self) -> String {
        match self {
            Self::Validation(errors) => errors.summary(),
            Self::AuthenticationRequired => "Please log in to continue.".to_string(),
            Self::SubmissionInProgress => {
                "Your report is still being submitted. Please wait.".to_string()
            }
            Self::Network(msg) if !msg.is_empty() => msg.clone(),
            Self::Network(_) => "Network error. Check your connection and try again.".to_string(),
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::Api { status: Some(code), .. } => format!("Request failed ({})", code),
            Self::Api { status: None, .. } => "An unexpected error occurred".to_string(),
            Self::PartialFailure { report_id, .. } => format!(
                "Report #{} was created, but its media failed to attach.",
                report_id
            ),
            Self::Storage(msg) => format!("Could not access local storage: {}", msg),
        }
    }

    /// Whether resubmitting the same form is a sensible next step.
    pub fn is_retryable_by_resubmit(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        tracing::warn!("Request failed: {}", err);
        ClientError::Network(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}
