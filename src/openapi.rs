use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::handlers::catalog::UploadRequest;
use crate::services::catalog::ListingView;

/// OpenAPI documentation for the public catalog surface. The authenticated
/// basket/order endpoints are documented in their handler modules.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "retail-api",
        description = "Retail marketplace backend: catalog ingestion, stock-aware baskets, order confirmation"
    ),
    paths(
        crate::handlers::catalog::upload_catalog,
        crate::handlers::catalog::list_products,
    ),
    components(schemas(ErrorResponse, UploadRequest, ListingView)),
    tags(
        (name = "catalog", description = "Catalog ingestion and the public listing view")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the document at /api-docs/openapi.json
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_spec_includes_catalog_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/upload"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/products"));
    }
}
