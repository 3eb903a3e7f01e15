use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockledger API",
        version = "0.1.0",
        description = r#"
# Stockledger API

Branch-scoped stock ledger for retail/pharmacy back offices.

Every quantity change is an immutable, auditable movement; physical counts
run as audits whose discrepancies reconcile back through the ledger. All
endpoints are scoped to a branch: the branch id in the path is validated
against every entity touched, and ids outside the caller's branch report
as not found.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        crate::handlers::movements::record_movement,
        crate::handlers::movements::list_movements,
        crate::handlers::products::get_product,
        crate::handlers::products::get_quantity,
        crate::handlers::products::list_low_stock,
        crate::handlers::audits::create_audit,
        crate::handlers::audits::list_audits,
        crate::handlers::audits::get_audit,
        crate::handlers::audits::count_item,
        crate::handlers::audits::complete_audit,
        crate::handlers::audits::cancel_audit,
        crate::handlers::audits::reconcile,
        crate::handlers::stats::get_stats,
        crate::handlers::health::health_check,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::movements::RecordMovementRequest,
        crate::handlers::products::QuantityResponse,
        crate::handlers::audits::CreateAuditRequest,
        crate::handlers::audits::CountItemRequest,
        crate::handlers::audits::ReconcileRequest,
        crate::services::stats::InventoryStats,
    )),
    tags(
        (name = "movements", description = "Append-only movement ledger"),
        (name = "products", description = "Catalog reads"),
        (name = "audits", description = "Physical counts and reconciliation"),
        (name = "stats", description = "Read-only statistics projection"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;

/// Swagger UI router, mounted by the server at `/docs`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
