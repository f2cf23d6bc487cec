use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::order::OrderStatus,
    platform::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, MerchantId},
    },
    routes::views::OrderView,
};

/// Merchant dashboard order routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/merchants/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(update_order_status))
            .route_layer(axum::middleware::from_fn(
                middleware::merchants_authorization,
            )),
    )
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct OrdersQuery {
    /// Only pending, confirmed, preparing and ready orders.
    #[serde(default)]
    active: bool,
}

/// Fetch the merchant's orders, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Merchant orders"],
    security(("merchantId" = [])),
    params(OrdersQuery),
    responses(
        (status = 200, description = "Get orders successfully", body = StdResponse<Vec<OrderView>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(MerchantId(merchant_id)): Extension<MerchantId>,
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state
        .marketplace
        .merchant_orders(merchant_id, query.active)
        .await?;

    Ok(StdResponse {
        data: Some(OrderView::many(orders, Utc::now())),
        message: Some("Get orders successfully"),
    })
}

/// Fetch one of the merchant's orders.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Merchant orders"],
    security(("merchantId" = [])),
    params(
        ("id" = i64, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderView, String>),
        (status = 404, description = "No such order for this merchant")
    )
)]
async fn get_order(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(MerchantId(merchant_id)): Extension<MerchantId>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.marketplace.merchant_order(merchant_id, id).await?;

    Ok(StdResponse {
        data: Some(OrderView::new(order, Utc::now())),
        message: Some("Get order successfully"),
    })
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusReq {
    pub status: OrderStatus,
}

/// Move an order to another status.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Merchant orders"],
    security(("merchantId" = [])),
    params(
        ("id" = i64, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Order status updated successfully", body = StdResponse<OrderView, String>),
        (status = 404, description = "No such order for this merchant"),
        (status = 409, description = "Transition not allowed from the current status")
    )
)]
async fn update_order_status(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(MerchantId(merchant_id)): Extension<MerchantId>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let order = state
        .marketplace
        .update_order_status(merchant_id, id, body.status, now)
        .await?;

    Ok(StdResponse {
        data: Some(OrderView::new(order, now)),
        message: Some("Order status updated successfully"),
    })
}
