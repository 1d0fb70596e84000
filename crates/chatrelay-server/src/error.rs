use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatrelay::errors::RelayError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Invalid value for {env_var}: {reason}")]
    InvalidValue { env_var: String, reason: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Map a dotted settings path to the environment variable that sets it.
pub fn to_env_var(field_path: &str) -> String {
    let mut env_var = String::from("RELAY_");
    env_var.push_str(&field_path.to_uppercase().replace('.', "__"));
    env_var
}

/// A relay failure on its way back to the client as a JSON error body.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::InvalidInput(_)
            | RelayError::UnknownProvider(_)
            | RelayError::InvalidModel { .. }
            | RelayError::PayloadTooLarge { .. } => StatusCode::BAD_REQUEST,
            // Rate limiting and provider unavailability are meaningful to the
            // client; anything else from upstream is a bad gateway.
            RelayError::Upstream {
                status: Some(status @ (429 | 503)),
                ..
            } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            RelayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            RelayError::MissingCredentials { .. } | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "relay failed before streaming");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "relay rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
