use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{BatchStatus, CouponStatus, DiscountType};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::batch::create_batch,
        handlers::batch::assign_codes,
        handlers::batch::activate_batch,
        handlers::batch::get_batch,
        handlers::batch::list_batches,
        handlers::batch::list_batch_coupons,
    ),
    components(
        schemas(
            BatchStatus,
            CouponStatus,
            DiscountType,
            CreateBatchRequest,
            AssignCodesRequest,
            ActivateBatchRequest,
            BatchListQuery,
            CouponListQuery,
            CouponStatusCounts,
            BatchResponse,
            AssignCodesResponse,
            ActivateBatchResponse,
            CouponResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "batch", description = "Coupon batch lifecycle API"),
    ),
    info(
        title = "Coupon Batch API",
        version = "1.0.0",
        description = "Coupon batch creation, serial number assignment and activation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_batch_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/batches",
            "/batches/{batch_id}",
            "/batches/{batch_id}/assign-codes",
            "/batches/{batch_id}/activate",
            "/batches/{batch_id}/coupons",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "{expected}");
        }
    }
}
