use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::order::NewOrder,
    platform::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, CustomerId},
    },
    routes::views::OrderView,
};

/// Customer-facing order routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/customers/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_order))
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

/// Place an order for the submitted cart.
///
/// Stock for every line is reserved atomically; the order starts as `pending`.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    security(("customerId" = [])),
    request_body = NewOrder,
    responses(
        (status = 201, description = "Create order successfully", body = StdResponse<OrderView, String>),
        (status = 409, description = "Not enough stock for a line"),
        (status = 422, description = "Invalid pickup window, quantities or listing ownership")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
    Json(mut body): Json<NewOrder>,
) -> Result<impl IntoResponse, AppError> {
    body.customer_id = customer_id;

    let now = Utc::now();
    let order = state.marketplace.place_order(body, now).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(OrderView::new(order, now)),
            message: Some("Create order successfully"),
        },
    ))
}

/// Fetch the authenticated customer's orders, newest first.
#[utoipa::path(
    get,
    path = "/my-orders",
    tags = ["Orders"],
    security(("customerId" = [])),
    responses(
        (status = 200, description = "Get my orders successfully", body = StdResponse<Vec<OrderView>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let orders = state.marketplace.customer_orders(customer_id).await?;

    Ok(StdResponse {
        data: Some(OrderView::many(orders, Utc::now())),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch one order of the authenticated customer.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("customerId" = [])),
    params(
        ("id" = i64, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderView, String>),
        (status = 404, description = "No such order for this customer")
    )
)]
async fn get_order(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(CustomerId(customer_id)): Extension<CustomerId>,
) -> Result<impl IntoResponse, AppError> {
    let order = state.marketplace.customer_order(customer_id, id).await?;

    Ok(StdResponse {
        data: Some(OrderView::new(order, Utc::now())),
        message: Some("Get order successfully"),
    })
}
