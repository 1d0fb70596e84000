use thiserror::Error;

/// Failures raised while preparing or opening a relay.
///
/// Every variant is produced before the first byte of the normalized stream
/// is written to the caller. Failures after that point travel inside the
/// stream as [`NormalizedEvent::Error`](crate::models::event::NormalizedEvent).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid model for provider {provider}: {model}")]
    InvalidModel { provider: String, model: String },

    #[error("Guest payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("{env_var} is not configured for provider {provider}")]
    MissingCredentials { provider: String, env_var: String },

    #[error("Upstream error{}: {body}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream { status: Option<u16>, body: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn upstream<S: Into<String>>(status: Option<u16>, body: S) -> Self {
        RelayError::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Upstream status code, when the failure came back from the provider.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            RelayError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            body: err.to_string(),
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
