//! Caller identity, as forwarded by the gateway in front of this service.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::platform::app_error::AppError;

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";
pub const MERCHANT_ID_HEADER: &str = "x-merchant-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomerId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerchantId(pub i64);

fn caller_id(req: &Request, header: &'static str) -> Result<i64, AppError> {
    req.headers()
        .get(header)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or(AppError::Unauthorized(header))
}

/// Requires `x-customer-id` and exposes it as `Extension<CustomerId>`.
pub async fn customers_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let id = caller_id(&req, CUSTOMER_ID_HEADER)?;
    req.extensions_mut().insert(CustomerId(id));
    Ok(next.run(req).await)
}

/// Requires `x-merchant-id` and exposes it as `Extension<MerchantId>`.
pub async fn merchants_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let id = caller_id(&req, MERCHANT_ID_HEADER)?;
    req.extensions_mut().insert(MerchantId(id));
    Ok(next.run(req).await)
}
