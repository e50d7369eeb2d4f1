use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Order has no items")]
    EmptyOrder,

    #[error("Invalid quantity for product {product_id}")]
    InvalidQuantity { product_id: Uuid },

    #[error("Products not found: {0:?}")]
    ProductNotFound(Vec<Uuid>),

    #[error("Coupon code not found")]
    DiscountNotFound,

    #[error("Coupon code has expired")]
    DiscountExpired,

    #[error("University name and email domain do not match a registered university")]
    DiscountNoMatch,

    #[error("Order not found")]
    OrderNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Order already paid")]
    AlreadyPaid,

    #[error("Order is not paid")]
    NotPaid,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound
            | AppError::ProductNotFound(_)
            | AppError::DiscountNotFound
            | AppError::OrderNotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::EmptyOrder
            | AppError::InvalidQuantity { .. }
            | AppError::DiscountExpired
            | AppError::DiscountNoMatch => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) | AppError::AlreadyPaid | AppError::NotPaid => {
                StatusCode::CONFLICT
            }
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::DbError(err) => tracing::error!(error = %err, "database error"),
            AppError::OrmError(err) => tracing::error!(error = %err, "orm error"),
            AppError::Internal(err) => tracing::error!(error = %err, "internal error"),
            _ => {}
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
