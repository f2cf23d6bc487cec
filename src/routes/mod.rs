use utoipa_axum::router::OpenApiRouter;

use crate::platform::app_state::AppState;

pub mod browse;
pub mod customers;
pub mod health;
pub mod merchants;
pub mod views;

/// Every route of the service, with its OpenAPI description.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(health::routes_with_openapi())
        .merge(browse::routes_with_openapi())
        .merge(customers::carts::routes_with_openapi())
        .merge(customers::orders::routes_with_openapi())
        .merge(merchants::profile::routes_with_openapi())
        .merge(merchants::orders::routes_with_openapi())
        .merge(merchants::listings::routes_with_openapi())
}
