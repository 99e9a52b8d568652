use crate::error::{AppError, AppResult};
use crate::middlewares::auth::current_admin;
use crate::models::*;
use crate::services::BatchService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde::de::DeserializeOwned;

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::ValidationError(format!("Invalid request body: {e}")))
}

/// 请求体可以为空（使用默认值），非空时必须是合法 JSON
fn parse_optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

#[utoipa::path(
    post,
    path = "/batches",
    tag = "batch",
    request_body = CreateBatchRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "批次已创建 (draft)", body = BatchResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "未授权"),
        (status = 404, description = "核销应用不存在")
    )
)]
pub async fn create_batch(
    batch_service: web::Data<BatchService>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let admin = match current_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };
    let request: CreateBatchRequest = match parse_body(&body) {
        Ok(request) => request,
        Err(e) => return Ok(e.error_response()),
    };

    match batch_service
        .create_batch(admin.tenant_id, request)
        .await
    {
        Ok(response) => Ok(HttpResponse::Created().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/batches/{batch_id}/assign-codes",
    tag = "batch",
    params(
        ("batch_id" = i64, Path, description = "批次ID")
    ),
    request_body = AssignCodesRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "券码分配成功", body = AssignCodesResponse),
        (status = 400, description = "数量超出范围"),
        (status = 404, description = "批次不存在"),
        (status = 409, description = "批次已分配券码")
    )
)]
pub async fn assign_codes(
    batch_service: web::Data<BatchService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let admin = match current_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };
    let request: AssignCodesRequest = match parse_optional_body(&body) {
        Ok(request) => request,
        Err(e) => return Ok(e.error_response()),
    };

    match batch_service
        .assign_codes(admin.tenant_id, path.into_inner(), request)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/batches/{batch_id}/activate",
    tag = "batch",
    params(
        ("batch_id" = i64, Path, description = "批次ID")
    ),
    request_body = ActivateBatchRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "批次已激活", body = ActivateBatchResponse),
        (status = 400, description = "批次状态不允许激活"),
        (status = 404, description = "批次不存在")
    )
)]
pub async fn activate_batch(
    batch_service: web::Data<BatchService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let admin = match current_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };
    let request: ActivateBatchRequest = match parse_optional_body(&body) {
        Ok(request) => request,
        Err(e) => return Ok(e.error_response()),
    };

    match batch_service
        .activate(admin.tenant_id, path.into_inner(), request)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/batches/{batch_id}",
    tag = "batch",
    params(
        ("batch_id" = i64, Path, description = "批次ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "批次详情", body = BatchResponse),
        (status = 404, description = "批次不存在")
    )
)]
pub async fn get_batch(
    batch_service: web::Data<BatchService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let admin = match current_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match batch_service
        .get_batch(admin.tenant_id, path.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/batches",
    tag = "batch",
    params(
        ("status" = Option<String>, Query, description = "状态: draft/code_assigned/activated"),
        ("product_id" = Option<i64>, Query, description = "核销应用ID"),
        ("page" = Option<u32>, Query, description = "页码"),
        ("limit" = Option<u32>, Query, description = "每页数量 (1-100)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "批次列表，按创建时间倒序"),
        (status = 401, description = "未授权")
    )
)]
pub async fn list_batches(
    batch_service: web::Data<BatchService>,
    req: HttpRequest,
    query: web::Query<BatchListQuery>,
) -> Result<HttpResponse> {
    let admin = match current_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match batch_service.list_batches(admin.tenant_id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/batches/{batch_id}/coupons",
    tag = "batch",
    params(
        ("batch_id" = i64, Path, description = "批次ID"),
        ("page" = Option<u32>, Query, description = "页码"),
        ("limit" = Option<u32>, Query, description = "每页数量 (1-100)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "批次券列表，按序列号升序"),
        (status = 404, description = "批次不存在")
    )
)]
pub async fn list_batch_coupons(
    batch_service: web::Data<BatchService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<CouponListQuery>,
) -> Result<HttpResponse> {
    let admin = match current_admin(&req) {
        Ok(admin) => admin,
        Err(e) => return Ok(e.error_response()),
    };

    match batch_service
        .list_batch_coupons(admin.tenant_id, path.into_inner(), &query)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn batch_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/batches")
            .route("", web::post().to(create_batch))
            .route("", web::get().to(list_batches))
            .route("/{batch_id}", web::get().to(get_batch))
            .route("/{batch_id}/assign-codes", web::post().to(assign_codes))
            .route("/{batch_id}/activate", web::post().to(activate_batch))
            .route("/{batch_id}/coupons", web::get().to(list_batch_coupons)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CouponConfig;
    use crate::entities::{
        BatchStatus, coupon_batch_entity as batches, serial_number_tracker_entity as tracker,
    };
    use crate::middlewares::AuthMiddleware;
    use crate::utils::{JwtService, TENANT_ADMIN_ROLE};
    use actix_web::dev::ServiceResponse;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use actix_web::App;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    const SECRET: &str = "handler-test-secret";

    fn bearer() -> String {
        let token = JwtService::new(SECRET, 3600)
            .generate_access_token(1, 3, TENANT_ADMIN_ROLE)
            .unwrap();
        format!("Bearer {token}")
    }

    fn draft_batch() -> batches::Model {
        batches::Model {
            id: 11,
            tenant_id: 3,
            verification_app_id: 5,
            batch_name: "B1".into(),
            dealer_name: None,
            zone: None,
            total_coupons: 500,
            serial_number_start: None,
            serial_number_end: None,
            batch_status: BatchStatus::Draft,
            activated_at: None,
            activation_note: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn exec_ok(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    /// 空 MockDatabase 上任何查询都会失败 (500)，可用来断言请求没有触达数据库
    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    async fn send(db: DatabaseConnection, req: actix_test::TestRequest) -> ServiceResponse {
        let service = BatchService::new(db, &CouponConfig::default(), 0);
        let app = actix_test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(JwtService::new(SECRET, 3600)))
                .app_data(web::Data::new(service))
                .service(web::scope("/api/v1").configure(batch_config)),
        )
        .await;
        let req = req.insert_header(("Authorization", bearer())).to_request();
        actix_test::call_service(&app, req).await
    }

    async fn assert_validation_error(resp: ServiceResponse) {
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_optional_body_empty_uses_default() {
        let request: AssignCodesRequest = parse_optional_body(b"").unwrap();
        assert!(request.quantity.is_none());
        let request: AssignCodesRequest = parse_optional_body(b" \n").unwrap();
        assert!(request.quantity.is_none());
        let request: AssignCodesRequest = parse_optional_body(br#"{"quantity":10}"#).unwrap();
        assert_eq!(request.quantity, Some(10));
    }

    #[test]
    fn test_optional_body_rejects_wrong_types() {
        let result: AppResult<AssignCodesRequest> = parse_optional_body(br#"{"quantity":"10"}"#);
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        let result: AppResult<ActivateBatchRequest> = parse_optional_body(b"{not json");
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[actix_web::test]
    async fn test_create_batch_validation_error_envelope() {
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/batches")
            .set_json(serde_json::json!({
                "product_id": 5,
                "batch_name": "B1",
                "total_coupons": 0
            }));
        assert_validation_error(send(empty_db(), req).await).await;
    }

    #[actix_web::test]
    async fn test_create_batch_malformed_body() {
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/batches")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(r#"{"product_id":"5","batch_name":"B1","total_coupons":10}"#);
        assert_validation_error(send(empty_db(), req).await).await;
    }

    #[actix_web::test]
    async fn test_assign_codes_malformed_body_reserves_nothing() {
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/batches/11/assign-codes")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(r#"{"quantity":"10"}"#);
        assert_validation_error(send(empty_db(), req).await).await;
    }

    #[actix_web::test]
    async fn test_activate_malformed_body() {
        let req = actix_test::TestRequest::post()
            .uri("/api/v1/batches/11/activate")
            .insert_header(("Content-Type", "application/json"))
            .set_payload(r#"{"note":42}"#);
        assert_validation_error(send(empty_db(), req).await).await;
    }

    #[actix_web::test]
    async fn test_assign_codes_empty_body_uses_requested_quantity() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![draft_batch()]])
            .append_query_results([vec![tracker::Model {
                id: 1,
                tenant_id: 3,
                last_serial_number: 30000,
                created_at: None,
                updated_at: None,
            }]])
            .append_exec_results([exec_ok(1), exec_ok(1), exec_ok(500), exec_ok(1)])
            .into_connection();
        let req = actix_test::TestRequest::post().uri("/api/v1/batches/11/assign-codes");
        let resp = send(db, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["serial_number_start"], 30001);
        assert_eq!(body["data"]["serial_number_end"], 30500);
        assert_eq!(body["data"]["coupons_generated"], 500);
    }

    #[actix_web::test]
    async fn test_get_missing_batch_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<batches::Model>::new()])
            .into_connection();
        let req = actix_test::TestRequest::get().uri("/api/v1/batches/404");
        let resp = send(db, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
