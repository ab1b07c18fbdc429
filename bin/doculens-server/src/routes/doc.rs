use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::routes::{analyze, health, status};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "doculens-server",
        description = "Asynchronous document text-extraction API",
        version = "0.1.0",
    ),
    modifiers(&ApiKeyAddon)
)]
pub struct ApiDoc;

struct ApiKeyAddon;

impl Modify for ApiKeyAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-api-key"))),
        );
    }
}

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(analyze::AnalyzeApi::openapi());
    root.merge(status::StatusApi::openapi());
    root
}
