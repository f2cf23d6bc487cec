use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::order::OrderLine,
    platform::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CustomerId},
    },
    routes::views::CartView,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/customers/carts",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(quote_cart))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteCartReq {
    pub lines: Vec<OrderLine>,
}

/// Price a cart against current listings without reserving anything.
#[utoipa::path(
    post,
    path = "/quote",
    tags = ["Carts"],
    security(("customerId" = [])),
    request_body = QuoteCartReq,
    responses(
        (status = 200, description = "Quote cart successfully", body = StdResponse<CartView, String>),
        (status = 409, description = "Listings from more than one merchant, or not enough stock")
    )
)]
async fn quote_cart(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(body): Json<QuoteCartReq>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(customer_id, lines = body.lines.len(), "Quoting cart");

    let cart = state.marketplace.quote_cart(&body.lines, Utc::now()).await?;

    Ok(StdResponse {
        data: Some(CartView::from(cart)),
        message: Some("Quote cart successfully"),
    })
}
