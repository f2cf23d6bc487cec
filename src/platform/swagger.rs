use utoipa::openapi::{
    Components, OpenApi,
    security::{ApiKey, ApiKeyValue, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::platform::middleware::{CUSTOMER_ID_HEADER, MERCHANT_ID_HEADER};

/// Serves the document at `/api-docs/openapi.json` and the UI at `/swagger-ui`.
pub fn create_swagger_ui(mut openapi: OpenApi) -> SwaggerUi {
    let components = openapi.components.get_or_insert_with(Components::new);
    components.add_security_scheme(
        "customerId",
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(CUSTOMER_ID_HEADER))),
    );
    components.add_security_scheme(
        "merchantId",
        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(MERCHANT_ID_HEADER))),
    );

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi)
}
