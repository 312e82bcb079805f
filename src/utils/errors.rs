//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del sistema
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::request::RequestStatus;

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request {request_id} cannot move from {from} to {attempted}")]
    InvalidStateTransition {
        request_id: Uuid,
        from: RequestStatus,
        attempted: RequestStatus,
    },

    #[error("No available vehicle could be claimed")]
    NoAvailableVehicle,

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl AppError {
    /// Código estable expuesto a los clientes
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            AppError::NoAvailableVehicle => "NO_AVAILABLE_VEHICLE",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Database(_) => "DB_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            AppError::NoAvailableVehicle => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().to_string();

        let error_response = match self {
            AppError::NotFound(msg) => {
                tracing::warn!("🔍 Recurso no encontrado: {}", msg);
                ErrorResponse {
                    error: "Not Found".to_string(),
                    message: msg,
                    details: None,
                    code,
                }
            }

            AppError::InvalidStateTransition {
                request_id,
                from,
                attempted,
            } => {
                tracing::warn!(%request_id, %from, %attempted, "🚫 Transición de estado inválida");
                ErrorResponse {
                    error: "Invalid State Transition".to_string(),
                    message: format!("Request cannot move from {} to {}", from, attempted),
                    details: Some(json!({
                        "request_id": request_id,
                        "current_status": from,
                        "attempted_status": attempted,
                    })),
                    code,
                }
            }

            AppError::NoAvailableVehicle => {
                tracing::warn!("⚠️ Sin vehículos disponibles");
                ErrorResponse {
                    error: "No Available Vehicle".to_string(),
                    message: "No vehicle is available right now. Please retry shortly".to_string(),
                    details: None,
                    code,
                }
            }

            AppError::Validation(e) => {
                tracing::warn!("⚠️ Error de validación: {}", e);
                ErrorResponse {
                    error: "Validation Error".to_string(),
                    message: "The provided data is invalid".to_string(),
                    details: Some(json!(e)),
                    code,
                }
            }

            AppError::BadRequest(msg) => {
                tracing::warn!("⚠️ Petición inválida: {}", msg);
                ErrorResponse {
                    error: "Bad Request".to_string(),
                    message: msg,
                    details: None,
                    code,
                }
            }

            AppError::Database(e) => {
                tracing::error!("❌ Error de base de datos: {}", e);
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "An error occurred while accessing the database".to_string(),
                    details: None,
                    code,
                }
            }

            AppError::Internal(msg) => {
                tracing::error!("❌ Error interno: {}", msg);
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "An unexpected error occurred".to_string(),
                    details: None,
                    code,
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.message = Some(message.into());

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de solicitud incorrecta
pub fn bad_request_error(message: &str) -> AppError {
    AppError::BadRequest(message.to_string())
}
