//! Errores que cruzan la frontera HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComplianceError {
    /// Error del cliente: campos ausentes o con tipo incorrecto.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error de despliegue: faltan credenciales o ajustes.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Compliance check timed out after {0} seconds")]
    Timeout(u64),

    #[error("No line items could be extracted: {0}")]
    Extraction(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ComplianceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ComplianceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ComplianceError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ComplianceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ComplianceError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ComplianceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        let (error, details) = match self {
            ComplianceError::InvalidInput(msg) => ("Invalid input".to_string(), Some(msg.clone())),
            ComplianceError::Configuration(msg) => {
                ("Service is not configured".to_string(), Some(msg.clone()))
            }
            ComplianceError::Timeout(_) => {
                ("Compliance check timed out".to_string(), Some(self.to_string()))
            }
            ComplianceError::Extraction(msg) => {
                ("Could not parse document".to_string(), Some(msg.clone()))
            }
            ComplianceError::Internal(e) => {
                ("Internal server error".to_string(), Some(format!("{e:#}")))
            }
        };
        ErrorResponse { error, details }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ComplianceError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}
