use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    domain::discovery::{Merchant, NewMerchant},
    platform::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
};

/// Merchant registration. Accounts and credentials live in the gateway; this
/// only records the storefront.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(utoipa_axum::routes!(register_merchant))
}

/// Register a merchant storefront.
#[utoipa::path(
    post,
    path = "/merchants",
    tags = ["Merchants"],
    request_body = NewMerchant,
    responses(
        (status = 201, description = "Register merchant successfully", body = StdResponse<Merchant, String>)
    )
)]
async fn register_merchant(
    State(state): State<AppState>,
    Json(body): Json<NewMerchant>,
) -> Result<impl IntoResponse, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("merchant name must not be empty".into()));
    }

    let merchant = state.marketplace.register_merchant(body).await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(merchant),
            message: Some("Register merchant successfully"),
        },
    ))
}
