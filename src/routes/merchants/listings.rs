use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::listing::{Bundle, Listing, ListingRef, NewBundle, NewProduct, Product},
    platform::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
        middleware::{self, MerchantId},
    },
};

/// Routes a merchant uses to publish and reprice listings.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest(
            "/merchants/products",
            OpenApiRouter::new()
                .routes(utoipa_axum::routes!(create_product))
                .routes(utoipa_axum::routes!(reprice_product))
                .route_layer(axum::middleware::from_fn(
                    middleware::merchants_authorization,
                )),
        )
        .nest(
            "/merchants/bundles",
            OpenApiRouter::new()
                .routes(utoipa_axum::routes!(create_bundle))
                .routes(utoipa_axum::routes!(reprice_bundle))
                .route_layer(axum::middleware::from_fn(
                    middleware::merchants_authorization,
                )),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RepriceReq {
    pub original_price: Decimal,
    pub discounted_price: Decimal,
}

/// List a new product.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Listings"],
    security(("merchantId" = [])),
    request_body = NewProduct,
    responses(
        (status = 201, description = "Create product successfully", body = StdResponse<Product, String>),
        (status = 422, description = "Product failed validation")
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Extension(MerchantId(merchant_id)): Extension<MerchantId>,
    Json(mut body): Json<NewProduct>,
) -> Result<impl IntoResponse, AppError> {
    body.merchant_id = merchant_id;
    let product = state.marketplace.create_product(body, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(product),
            message: Some("Create product successfully"),
        },
    ))
}

/// Change a product's prices. Placed orders keep the price they were charged.
#[utoipa::path(
    put,
    path = "/{id}/price",
    tags = ["Listings"],
    security(("merchantId" = [])),
    params(
        ("id" = i64, Path, description = "Product ID to reprice")
    ),
    request_body = RepriceReq,
    responses(
        (status = 200, description = "Reprice product successfully", body = StdResponse<Listing, String>),
        (status = 404, description = "No such product for this merchant")
    )
)]
async fn reprice_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(MerchantId(merchant_id)): Extension<MerchantId>,
    Json(body): Json<RepriceReq>,
) -> Result<impl IntoResponse, AppError> {
    let listing = state
        .marketplace
        .reprice_listing(
            merchant_id,
            ListingRef::Product(id),
            body.original_price,
            body.discounted_price,
        )
        .await?;

    Ok(StdResponse {
        data: Some(listing),
        message: Some("Reprice product successfully"),
    })
}

/// List a new bundle of the merchant's own products.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Listings"],
    security(("merchantId" = [])),
    request_body = NewBundle,
    responses(
        (status = 201, description = "Create bundle successfully", body = StdResponse<Bundle, String>),
        (status = 422, description = "Bundle failed validation")
    )
)]
async fn create_bundle(
    State(state): State<AppState>,
    Extension(MerchantId(merchant_id)): Extension<MerchantId>,
    Json(mut body): Json<NewBundle>,
) -> Result<impl IntoResponse, AppError> {
    body.merchant_id = merchant_id;
    let bundle = state.marketplace.create_bundle(body, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(bundle),
            message: Some("Create bundle successfully"),
        },
    ))
}

/// Change a bundle's prices.
#[utoipa::path(
    put,
    path = "/{id}/price",
    tags = ["Listings"],
    security(("merchantId" = [])),
    params(
        ("id" = i64, Path, description = "Bundle ID to reprice")
    ),
    request_body = RepriceReq,
    responses(
        (status = 200, description = "Reprice bundle successfully", body = StdResponse<Listing, String>),
        (status = 404, description = "No such bundle for this merchant")
    )
)]
async fn reprice_bundle(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(MerchantId(merchant_id)): Extension<MerchantId>,
    Json(body): Json<RepriceReq>,
) -> Result<impl IntoResponse, AppError> {
    let listing = state
        .marketplace
        .reprice_listing(
            merchant_id,
            ListingRef::Bundle(id),
            body.original_price,
            body.discounted_price,
        )
        .await?;

    Ok(StdResponse {
        data: Some(listing),
        message: Some("Reprice bundle successfully"),
    })
}
