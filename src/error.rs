use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("Product not found")]
    ProductNotFound,

    #[error("Stock for product {name} is not enough.")]
    InsufficientStock { name: String },

    #[error("Could not generate a unique order code")]
    DuplicateOrderCode,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_)
            | AppError::ProductNotFound
            | AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateOrderCode
            | AppError::DbError(_)
            | AppError::OrmError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> serde_json::Value {
        match self {
            // Field-level detail, keyed by the offending field.
            AppError::Validation(errors) => {
                serde_json::to_value(errors).unwrap_or_else(|_| serde_json::json!({}))
            }
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(self.detail()),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// A single-field validation failure built outside the derive macros, for
/// checks that need the database (unique email, referenced category, ...).
pub fn field_error(field: &'static str, code: &'static str, message: &'static str) -> AppError {
    let mut errors = ValidationErrors::new();
    errors.add(
        field.into(),
        validator::ValidationError::new(code).with_message(message.into()),
    );
    AppError::Validation(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_unprocessable_entity() {
        assert_eq!(
            AppError::ProductNotFound.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::InsufficientStock {
                name: "Meja Makan".into()
            }
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Validation(ValidationErrors::new()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn insufficient_stock_names_the_product() {
        let err = AppError::InsufficientStock {
            name: "Ferris Mug".into(),
        };
        assert_eq!(err.to_string(), "Stock for product Ferris Mug is not enough.");
    }

    #[test]
    fn order_code_collision_is_a_server_error() {
        assert_eq!(
            AppError::DuplicateOrderCode.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
