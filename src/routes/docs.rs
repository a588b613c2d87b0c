use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Where the rendered UI fetches the generated document from.
const OPENAPI_JSON_PATH: &str = "/api-doc/openapi.json";

/// Swagger UI for the Amadeus API, plus the raw OpenAPI document it renders.
///
/// Stateless like the document itself; merged into the API router alongside
/// the other route subtrees.
pub fn router() -> Router<SharedState> {
    SwaggerUi::new("/docs")
        .url(OPENAPI_JSON_PATH, ApiDoc::openapi())
        .into()
}
