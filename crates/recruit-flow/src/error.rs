use crate::config::ConfigError;
use crate::pipeline::PipelineError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Wire-level error codes shared with the portal client. Domain errors map
/// onto a subset of these; `NETWORK_ERROR`, `BAD_RESPONSE`, and
/// `CONFIG_MISSING` are detected on the client side of the transport but
/// belong to the same vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RbacDenied,
    IllegalTransition,
    Validation,
    Conflict,
    NotFound,
    ConfigMissing,
    BadResponse,
    NetworkError,
    UnknownError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::RbacDenied => "RBAC_DENIED",
            ErrorCode::IllegalTransition => "ILLEGAL_TRANSITION",
            ErrorCode::Validation => "VALIDATION",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ConfigMissing => "CONFIG_MISSING",
            ErrorCode::BadResponse => "BAD_RESPONSE",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Pipeline(PipelineError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Pipeline(err) => write!(f, "pipeline error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Pipeline(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::ConfigMissing),
            AppError::Pipeline(err) => (StatusCode::OK, err.code()),
            AppError::Telemetry(_) | AppError::Io(_) | AppError::Server(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::UnknownError)
            }
        };

        let body = Json(json!({
            "ok": false,
            "error": { "code": code.as_str(), "message": self.to_string() },
        }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}
