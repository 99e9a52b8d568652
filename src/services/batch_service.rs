use crate::config::CouponConfig;
use crate::entities::{
    BatchStatus, CouponStatus, coupon_batch_entity as batches, coupon_entity as coupons,
    verification_app_entity as apps,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::batch_lifecycle::BatchTransition;
use crate::services::coupon_materializer::{CouponDefaults, CouponMaterializer};
use crate::services::serial_allocator::SerialNumberAllocator;
use crate::utils::CouponCodeFormat;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

const MAX_NAME_LEN: usize = 255;
const MAX_ZONE_LEN: usize = 100;

#[derive(Debug, FromQueryResult)]
struct StatusCountRow {
    batch_id: i64,
    status: String,
    count: i64,
}

/// 批次流程编排：创建 -> 分配券码 -> 激活，每一步一个事务
#[derive(Clone)]
pub struct BatchService {
    pool: Arc<DatabaseConnection>,
    allocator: SerialNumberAllocator,
    materializer: CouponMaterializer,
    max_batch_size: i64,
    lock_timeout_ms: u64,
}

impl BatchService {
    pub fn new(pool: DatabaseConnection, config: &CouponConfig, lock_timeout_ms: u64) -> Self {
        Self {
            pool: Arc::new(pool),
            allocator: SerialNumberAllocator::new(config.serial_seed),
            materializer: CouponMaterializer::new(
                CouponCodeFormat::V1,
                config.insert_chunk_size,
                CouponDefaults::from(config),
            ),
            max_batch_size: config.max_batch_size,
            lock_timeout_ms,
        }
    }

    /// 开启事务；配置了 lock_timeout 时作为事务内第一条语句设置，
    /// 之后的批次行锁、计数器插入与行锁等待都受其约束
    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        let txn = self.pool.begin().await?;
        if self.lock_timeout_ms > 0 {
            txn.execute_unprepared(&format!(
                "SET LOCAL lock_timeout = '{}ms'",
                self.lock_timeout_ms
            ))
            .await?;
        }
        Ok(txn)
    }

    /// 创建草稿批次，此时不分配序列号
    pub async fn create_batch(
        &self,
        tenant_id: i64,
        req: CreateBatchRequest,
    ) -> AppResult<BatchResponse> {
        self.validate_quantity(req.total_coupons)?;
        let batch_name = req.batch_name.trim().to_string();
        if batch_name.is_empty() {
            return Err(AppError::ValidationError("Batch name is required".into()));
        }
        if batch_name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::ValidationError("Batch name is too long".into()));
        }
        let dealer_name = normalize_optional(req.dealer_name);
        if dealer_name
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_NAME_LEN)
        {
            return Err(AppError::ValidationError("Dealer name is too long".into()));
        }
        let zone = normalize_optional(req.zone);
        if zone.as_ref().is_some_and(|z| z.chars().count() > MAX_ZONE_LEN) {
            return Err(AppError::ValidationError("Zone is too long".into()));
        }

        // 租户条件放在查询里，避免跨租户探测
        apps::Entity::find()
            .filter(apps::Column::Id.eq(req.product_id))
            .filter(apps::Column::TenantId.eq(tenant_id))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Verification app not found".into()))?;

        let batch = batches::ActiveModel {
            tenant_id: Set(tenant_id),
            verification_app_id: Set(req.product_id),
            batch_name: Set(batch_name),
            dealer_name: Set(dealer_name),
            zone: Set(zone),
            total_coupons: Set(req.total_coupons),
            batch_status: Set(BatchStatus::Draft),
            ..Default::default()
        }
        .insert(self.pool.as_ref())
        .await?;

        log::info!(
            "Created batch {} for tenant {tenant_id} (app {}, {} coupons requested)",
            batch.id,
            batch.verification_app_id,
            batch.total_coupons
        );

        Ok(BatchResponse::from(batch))
    }

    /// 分配券码
    ///
    /// 同一事务内依次完成:
    /// 1. 锁定批次行并校验状态
    /// 2. 锁定租户计数器并预留区间
    /// 3. 批量写入券记录
    /// 4. 回写批次区间与状态
    ///
    /// 任一步失败整体回滚，批次保持 draft，计数器不变。
    pub async fn assign_codes(
        &self,
        tenant_id: i64,
        batch_id: i64,
        req: AssignCodesRequest,
    ) -> AppResult<AssignCodesResponse> {
        if let Some(quantity) = req.quantity {
            self.validate_quantity(quantity)?;
        }

        let txn = self.begin().await?;

        let batch = lock_batch(&txn, tenant_id, batch_id).await?;
        let next_status = batch
            .batch_status
            .apply(BatchTransition::AssignCodes)
            .inspect_err(|e| log::warn!("Rejected assign_codes on batch {batch_id}: {e}"))?;

        let quantity = req.quantity.unwrap_or(batch.total_coupons);
        self.validate_quantity(quantity)?;
        if quantity != batch.total_coupons {
            log::warn!(
                "Batch {batch_id} assigned {quantity} coupons but requested {}",
                batch.total_coupons
            );
        }

        let range = self
            .allocator
            .reserve_range(&txn, tenant_id, quantity)
            .await?;
        let generated = self.materializer.generate(&txn, &batch, range).await?;

        let result = batches::Entity::update_many()
            .set(batches::ActiveModel {
                serial_number_start: Set(Some(range.start)),
                serial_number_end: Set(Some(range.end)),
                batch_status: Set(next_status),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(batches::Column::Id.eq(batch.id))
            .filter(batches::Column::TenantId.eq(tenant_id))
            .filter(batches::Column::BatchStatus.eq(batch.batch_status))
            .exec(&txn)
            .await?;
        if result.rows_affected != 1 {
            return Err(AppError::Conflict(format!(
                "Batch {batch_id} changed while assigning codes"
            )));
        }

        txn.commit().await?;

        log::info!(
            "Assigned serials {}..={} ({generated} coupons) to batch {batch_id} of tenant {tenant_id}",
            range.start,
            range.end
        );

        Ok(AssignCodesResponse {
            batch_id,
            serial_number_start: range.start,
            serial_number_end: range.end,
            coupons_generated: generated,
            batch_status: next_status,
        })
    }

    /// 激活批次：券状态 generated -> printed，批次 code_assigned -> activated
    pub async fn activate(
        &self,
        tenant_id: i64,
        batch_id: i64,
        req: ActivateBatchRequest,
    ) -> AppResult<ActivateBatchResponse> {
        let note = normalize_optional(req.note);

        let txn = self.begin().await?;

        let batch = lock_batch(&txn, tenant_id, batch_id).await?;
        let next_status = batch
            .batch_status
            .apply(BatchTransition::Activate)
            .inspect_err(|e| log::warn!("Rejected activate on batch {batch_id}: {e}"))?;
        let (serial_start, serial_end) = batch.serial_range().ok_or_else(|| {
            AppError::InternalError(format!("Batch {batch_id} has no serial range"))
        })?;

        let now = Utc::now();
        let printed = coupons::Entity::update_many()
            .set(coupons::ActiveModel {
                status: Set(CouponStatus::Printed),
                printed_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(coupons::Column::BatchId.eq(batch.id))
            .filter(coupons::Column::TenantId.eq(tenant_id))
            .filter(coupons::Column::Status.eq(CouponStatus::Generated))
            .exec(&txn)
            .await?;

        let result = batches::Entity::update_many()
            .set(batches::ActiveModel {
                batch_status: Set(next_status),
                activated_at: Set(Some(now)),
                activation_note: Set(note.clone()),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(batches::Column::Id.eq(batch.id))
            .filter(batches::Column::TenantId.eq(tenant_id))
            .filter(batches::Column::BatchStatus.eq(batch.batch_status))
            .exec(&txn)
            .await?;
        if result.rows_affected != 1 {
            return Err(AppError::Conflict(format!(
                "Batch {batch_id} changed while activating"
            )));
        }

        txn.commit().await?;

        log::info!(
            "Activated batch {batch_id} of tenant {tenant_id} ({serial_start}..={serial_end}), {} coupons printed",
            printed.rows_affected
        );

        Ok(ActivateBatchResponse {
            batch_id,
            batch_status: next_status,
            coupons_printed: printed.rows_affected as i64,
            activation_note: note,
            activated_at: now,
        })
    }

    pub async fn get_batch(&self, tenant_id: i64, batch_id: i64) -> AppResult<BatchResponse> {
        let batch = find_batch(self.pool.as_ref(), tenant_id, batch_id).await?;
        let mut counts = coupon_counts(self.pool.as_ref(), &[batch.id]).await?;
        let batch_counts = counts.remove(&batch.id).unwrap_or_default();
        Ok(BatchResponse::new(batch, batch_counts))
    }

    pub async fn list_batches(
        &self,
        tenant_id: i64,
        query: &BatchListQuery,
    ) -> AppResult<BatchPageResponse> {
        let params = PaginationParams::new(query.page, query.limit);

        let mut base_query = batches::Entity::find().filter(batches::Column::TenantId.eq(tenant_id));
        if let Some(status) = query.status {
            base_query = base_query.filter(batches::Column::BatchStatus.eq(status));
        }
        if let Some(product_id) = query.product_id {
            base_query = base_query.filter(batches::Column::VerificationAppId.eq(product_id));
        }

        let total = base_query.clone().count(self.pool.as_ref()).await? as i64;

        let models = base_query
            .order_by_desc(batches::Column::CreatedAt)
            .order_by_desc(batches::Column::Id)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset() as u64)
            .all(self.pool.as_ref())
            .await?;

        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let mut counts = coupon_counts(self.pool.as_ref(), &ids).await?;

        let items = models
            .into_iter()
            .map(|m| {
                let c = counts.remove(&m.id).unwrap_or_default();
                BatchResponse::new(m, c)
            })
            .collect();

        Ok(PaginatedResponse::new(
            items,
            params.get_page(),
            params.get_limit(),
            total,
        ))
    }

    /// 按序列号顺序分页导出批次下的券（印刷用）
    pub async fn list_batch_coupons(
        &self,
        tenant_id: i64,
        batch_id: i64,
        query: &CouponListQuery,
    ) -> AppResult<CouponPageResponse> {
        let batch = find_batch(self.pool.as_ref(), tenant_id, batch_id).await?;
        let params = PaginationParams::new(query.page, query.limit);

        let base_query = coupons::Entity::find()
            .filter(coupons::Column::BatchId.eq(batch.id))
            .filter(coupons::Column::TenantId.eq(tenant_id));

        let total = base_query.clone().count(self.pool.as_ref()).await? as i64;

        let items = base_query
            .order_by_asc(coupons::Column::SerialNumber)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset() as u64)
            .all(self.pool.as_ref())
            .await?
            .into_iter()
            .map(CouponResponse::from)
            .collect();

        Ok(PaginatedResponse::new(
            items,
            params.get_page(),
            params.get_limit(),
            total,
        ))
    }

    fn validate_quantity(&self, quantity: i64) -> AppResult<()> {
        if quantity < 1 || quantity > self.max_batch_size {
            return Err(AppError::ValidationError(format!(
                "Coupon quantity must be between 1 and {}",
                self.max_batch_size
            )));
        }
        Ok(())
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 在事务内对批次加行锁，同一批次的并发写操作在此串行
async fn lock_batch(
    txn: &DatabaseTransaction,
    tenant_id: i64,
    batch_id: i64,
) -> AppResult<batches::Model> {
    batches::Entity::find()
        .filter(batches::Column::Id.eq(batch_id))
        .filter(batches::Column::TenantId.eq(tenant_id))
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch not found".into()))
}

async fn find_batch<C: ConnectionTrait>(
    db: &C,
    tenant_id: i64,
    batch_id: i64,
) -> AppResult<batches::Model> {
    batches::Entity::find()
        .filter(batches::Column::Id.eq(batch_id))
        .filter(batches::Column::TenantId.eq(tenant_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch not found".into()))
}

/// 一条 GROUP BY 查询统计多个批次的券状态分布
async fn coupon_counts<C: ConnectionTrait>(
    db: &C,
    batch_ids: &[i64],
) -> AppResult<HashMap<i64, CouponStatusCounts>> {
    if batch_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = coupons::Entity::find()
        .select_only()
        .column(coupons::Column::BatchId)
        .column_as(Expr::cust("\"coupons\".\"status\"::text"), "status")
        .column_as(Expr::col(coupons::Column::Id).count(), "count")
        .filter(coupons::Column::BatchId.is_in(batch_ids.iter().copied()))
        .group_by(coupons::Column::BatchId)
        .group_by(coupons::Column::Status)
        .into_model::<StatusCountRow>()
        .all(db)
        .await?;

    let mut counts: HashMap<i64, CouponStatusCounts> = HashMap::new();
    for row in rows {
        let status = CouponStatus::try_from_value(&row.status)?;
        counts
            .entry(row.batch_id)
            .or_default()
            .add(status, row.count);
    }
    Ok(counts)
}
