//! Error handling for the Batchtrace server
//!
//! Every service contract returns `AppResult<T>`. Domain errors from the
//! `shared` crate convert into `AppError` and render as a JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{
    AllocationError, FormulationError, IngredientPair, LotNumberError, ProductionError, ScaleError, Shortage,
};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Engine errors
    #[error("Insufficient stock for {} ingredient(s)", .0.len())]
    Shortfall(Vec<Shortage>),

    #[error("Incompatible ingredients in batch {lot_number}")]
    Conflict {
        lot_number: String,
        pairs: Vec<IngredientPair>,
    },

    #[error("Overlapping formulation: {0}")]
    OverlapViolation(String),

    #[error("Inventory is busy, retry the request")]
    Contention,

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<LotNumberError> for AppError {
    fn from(err: LotNumberError) -> Self {
        AppError::validation("lot_number", err.to_string())
    }
}

impl From<FormulationError> for AppError {
    fn from(err: FormulationError) -> Self {
        match err {
            FormulationError::Overlap { .. } => AppError::OverlapViolation(err.to_string()),
            FormulationError::InvalidRange { .. } => AppError::validation("effective_end", err.to_string()),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Shortfall(shortage) => AppError::Shortfall(vec![shortage]),
            AllocationError::LotNotAvailable(lot) => AppError::NotFound(format!("Inventory lot {}", lot)),
            AllocationError::LotExhausted(_)
            | AllocationError::LotExpired(_)
            | AllocationError::NonPositiveDemand(_)
            | AllocationError::EmptyManualSelection(_) => AppError::InvalidState(err.to_string()),
        }
    }
}

impl From<ProductionError> for AppError {
    fn from(err: ProductionError) -> Self {
        match err {
            ProductionError::Shortfall(shortages) => AppError::Shortfall(shortages),
            ProductionError::Allocation(inner) => inner.into(),
        }
    }
}

impl From<ScaleError> for AppError {
    fn from(err: ScaleError) -> Self {
        AppError::InvalidState(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Unauthorized(message) => (
                StatusCode::FORBIDDEN,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::InvalidState(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("INVALID_STATE", msg.clone()),
            ),
            AppError::DuplicateEntry(what) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(what.clone()),
                    ..ErrorDetail::new("DUPLICATE_ENTRY", format!("{} already exists", what))
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::Shortfall(shortages) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: serde_json::to_value(shortages).ok(),
                    ..ErrorDetail::new(
                        "SHORTFALL",
                        shortages
                            .iter()
                            .map(|s| s.to_string())
                            .collect::<Vec<_>>()
                            .join("; "),
                    )
                },
            ),
            AppError::Conflict { lot_number, pairs } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    details: serde_json::to_value(pairs).ok(),
                    ..ErrorDetail::new(
                        "INCOMPATIBLE_INGREDIENTS",
                        format!(
                            "Batch {} combines {}",
                            lot_number,
                            pairs.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
                        ),
                    )
                },
            ),
            AppError::OverlapViolation(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some("effective_start".to_string()),
                    ..ErrorDetail::new("OVERLAP_VIOLATION", msg.clone())
                },
            ),
            AppError::Contention => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("CONTENTION", "Inventory is busy, retry the request"),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_shortfall_maps_to_unprocessable() {
        let err: AppError = AllocationError::Shortfall(Shortage {
            ingredient_id: 1,
            needed: Decimal::from(15),
            available: Decimal::from(5),
        })
        .into();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_missing_manual_lot_maps_to_not_found() {
        let lot = shared::IngredientLotNumber::new(1, "S1", "B1").unwrap();
        let err: AppError = AllocationError::LotNotAvailable(lot).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_oversized_multiplier_is_bad_request() {
        let lines = [shared::RecipeLine { ingredient_id: 1, quantity: Decimal::from(9999) }];
        let err: AppError = shared::scale_recipe(&lines, Decimal::MAX).unwrap_err().into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_contention_is_retryable_status() {
        assert_eq!(AppError::Contention.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
