//! HTTP-facing error type and the standard response envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use utoipa::ToSchema;

use crate::domain::errors::{CartError, ListingError, OrderError, QuoteError, StorageError};

/// Envelope every successful handler answers with.
#[derive(Debug, Serialize, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T, M> IntoResponse for StdResponse<T, M>
where
    T: Serialize,
    M: Serialize,
{
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable error code.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("resource not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("missing or invalid {0} header")]
    Unauthorized(&'static str),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        Self::Other(error.into())
    }
}

impl From<QuoteError> for AppError {
    fn from(error: QuoteError) -> Self {
        match error {
            QuoteError::Cart(error) => error.into(),
            QuoteError::Order(error) => error.into(),
            QuoteError::Storage(error) => error.into(),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Option<Value>) {
        match self {
            Self::NotFound => (StatusCode::NOT_FOUND, "not_found", None),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            Self::Cart(CartError::CrossMerchant {
                cart_merchant,
                listing_merchant,
            }) => (
                StatusCode::CONFLICT,
                "cross_merchant_cart",
                Some(json!({
                    "cart_merchant_id": cart_merchant,
                    "listing_merchant_id": listing_merchant,
                })),
            ),
            Self::Cart(CartError::InvalidQuantity) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_order", None)
            }
            Self::Order(error) => match error {
                OrderError::InvalidPickupWindow => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "invalid_pickup_window", None)
                }
                OrderError::EmptyOrder => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_order", None),
                OrderError::InvalidQuantity(listing) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid_order",
                    Some(json!({ "listing": listing })),
                ),
                OrderError::MerchantNotFound(_) | OrderError::OrderNotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", None)
                }
                OrderError::OwnershipMismatch {
                    listing,
                    merchant_id,
                } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "ownership_mismatch",
                    Some(json!({ "listing": listing, "merchant_id": merchant_id })),
                ),
                OrderError::InsufficientInventory {
                    listing,
                    requested,
                    available,
                } => (
                    StatusCode::CONFLICT,
                    "insufficient_inventory",
                    Some(json!({
                        "listing": listing,
                        "requested": requested,
                        "available": available,
                    })),
                ),
                OrderError::IllegalStatusTransition { current, requested } => (
                    StatusCode::CONFLICT,
                    "illegal_status_transition",
                    Some(json!({ "current_status": current, "requested_status": requested })),
                ),
                OrderError::CodeGenerationExhausted { .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "code_generation_exhausted",
                    None,
                ),
                OrderError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
            },
            Self::Listing(error) => match error {
                ListingError::MerchantNotFound(_) | ListingError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", None)
                }
                ListingError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
                _ => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_listing", None),
            },
            Self::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.parts();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{listing::ListingRef, order::OrderStatus};

    use super::*;

    #[test]
    fn illegal_transition_reports_current_status() {
        let error = AppError::from(OrderError::IllegalStatusTransition {
            current: OrderStatus::Completed,
            requested: OrderStatus::Pending,
        });

        let (status, code, details) = error.parts();

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "illegal_status_transition");
        assert_eq!(details.unwrap()["current_status"], "completed");
    }

    #[test]
    fn inventory_shortfall_is_a_conflict() {
        let error = AppError::from(OrderError::InsufficientInventory {
            listing: ListingRef::Product(7),
            requested: 2,
            available: 1,
        });

        let (status, code, details) = error.parts();

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "insufficient_inventory");
        assert_eq!(details.unwrap()["available"], 1);
    }

    #[test]
    fn storage_failures_are_internal() {
        let error = AppError::from(StorageError::Pool("timed out".into()));

        assert_eq!(error.parts().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
