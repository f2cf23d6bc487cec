use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::{
        discovery::{ListingFilter, MerchantSummary},
        geo::GeoPoint,
    },
    platform::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    routes::views::{BundleCard, ProductCard},
};

/// Public discovery routes; no caller identity needed.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/browse",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(browse_merchants))
            .routes(utoipa_axum::routes!(browse_products))
            .routes(utoipa_axum::routes!(browse_bundles)),
    )
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct MerchantsQuery {
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// Radius in kilometres.
    radius: Option<f64>,
}

/// List merchants, optionally only those near a point.
#[utoipa::path(
    get,
    path = "/merchants",
    tags = ["Browse"],
    params(MerchantsQuery),
    responses(
        (status = 200, description = "Get merchants successfully", body = StdResponse<Vec<MerchantSummary>, String>)
    )
)]
async fn browse_merchants(
    State(state): State<AppState>,
    Query(query): Query<MerchantsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let center = match (query.latitude, query.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
        _ => None,
    };

    let merchants = state
        .marketplace
        .browse_merchants(center, query.radius, Utc::now())
        .await?;

    Ok(StdResponse {
        data: Some(merchants),
        message: Some("Get merchants successfully"),
    })
}

/// List available products, most urgent expiry first.
#[utoipa::path(
    get,
    path = "/products",
    tags = ["Browse"],
    params(ListingFilter),
    responses(
        (status = 200, description = "Get products successfully", body = StdResponse<Vec<ProductCard>, String>),
        (status = 400, description = "Invalid filter")
    )
)]
async fn browse_products(
    State(state): State<AppState>,
    Query(filter): Query<ListingFilter>,
) -> Result<impl IntoResponse, AppError> {
    filter.validate().map_err(AppError::BadRequest)?;

    let products: Vec<ProductCard> = state
        .marketplace
        .browse_products(&filter, Utc::now())
        .await?
        .into_iter()
        .map(ProductCard::from)
        .collect();

    Ok(StdResponse {
        data: Some(products),
        message: Some("Get products successfully"),
    })
}

/// List available bundles, most urgent expiry first.
#[utoipa::path(
    get,
    path = "/bundles",
    tags = ["Browse"],
    params(ListingFilter),
    responses(
        (status = 200, description = "Get bundles successfully", body = StdResponse<Vec<BundleCard>, String>),
        (status = 400, description = "Invalid filter")
    )
)]
async fn browse_bundles(
    State(state): State<AppState>,
    Query(filter): Query<ListingFilter>,
) -> Result<impl IntoResponse, AppError> {
    filter.validate().map_err(AppError::BadRequest)?;

    let bundles: Vec<BundleCard> = state
        .marketplace
        .browse_bundles(&filter, Utc::now())
        .await?
        .into_iter()
        .map(BundleCard::from)
        .collect();

    Ok(StdResponse {
        data: Some(bundles),
        message: Some("Get bundles successfully"),
    })
}
