//! 租户级序列号分配
//!
//! 计数器行在整个分配事务期间持有排他行锁 (`SELECT ... FOR UPDATE`)，同一租户的
//! 并发分配在此排队；不同租户的计数器行互不影响。分配结果与后续的券写入处于同一个
//! 事务，事务回滚时计数器一并回滚，不会出现被"烧掉"的序列号。

use crate::entities::serial_number_tracker_entity as tracker;
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect, Set};

/// 闭区间 `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialRange {
    pub start: i64,
    pub end: i64,
}

impl SerialRange {
    /// 紧接在 `last_serial_number` 之后的 `quantity` 个序列号
    pub fn after(last_serial_number: i64, quantity: i64) -> AppResult<SerialRange> {
        if quantity <= 0 {
            return Err(AppError::ValidationError(
                "Quantity must be a positive integer".to_string(),
            ));
        }
        let start = last_serial_number
            .checked_add(1)
            .ok_or_else(|| AppError::InternalError("Serial number space exhausted".into()))?;
        let end = last_serial_number
            .checked_add(quantity)
            .ok_or_else(|| AppError::InternalError("Serial number space exhausted".into()))?;
        Ok(SerialRange { start, end })
    }

    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<i64> {
        self.start..=self.end
    }
}

#[derive(Clone)]
pub struct SerialNumberAllocator {
    seed: i64,
}

impl SerialNumberAllocator {
    pub fn new(seed: i64) -> Self {
        Self { seed }
    }

    /// 为租户预留 `quantity` 个连续序列号
    ///
    /// 只接受事务句柄：行锁持续到调用方提交或回滚为止，调用方必须在同一事务里
    /// 完成券写入。
    pub async fn reserve_range(
        &self,
        txn: &DatabaseTransaction,
        tenant_id: i64,
        quantity: i64,
    ) -> AppResult<SerialRange> {
        if quantity <= 0 {
            return Err(AppError::ValidationError(
                "Quantity must be a positive integer".to_string(),
            ));
        }

        // 1. 计数器不存在则以 seed 初始化 (并发安全的 insert-if-absent)
        tracker::Entity::insert(tracker::ActiveModel {
            tenant_id: Set(tenant_id),
            last_serial_number: Set(self.seed),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::column(tracker::Column::TenantId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

        // 2. 加排他行锁读取当前值，等待上限由事务的 lock_timeout 决定
        let row = tracker::Entity::find()
            .filter(tracker::Column::TenantId.eq(tenant_id))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "Serial number tracker missing for tenant {tenant_id}"
                ))
            })?;

        let range = SerialRange::after(row.last_serial_number, quantity)?;

        // 3. 回写
        let result = tracker::Entity::update_many()
            .col_expr(tracker::Column::LastSerialNumber, Expr::value(range.end))
            .col_expr(tracker::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tracker::Column::TenantId.eq(tenant_id))
            .exec(txn)
            .await?;
        if result.rows_affected != 1 {
            return Err(AppError::InternalError(format!(
                "Serial number tracker update touched {} rows for tenant {tenant_id}",
                result.rows_affected
            )));
        }

        log::debug!(
            "Reserved serial range tenant={tenant_id} start={} end={} (previous last={})",
            range.start,
            range.end,
            row.last_serial_number
        );

        Ok(range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, TransactionTrait};

    fn tracker_row(tenant_id: i64, last: i64) -> tracker::Model {
        tracker::Model {
            id: 1,
            tenant_id,
            last_serial_number: last,
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

    #[test]
    fn test_range_after_last() {
        let range = SerialRange::after(30000, 500).unwrap();
        assert_eq!(range, SerialRange { start: 30001, end: 30500 });
        assert_eq!(range.len(), 500);
        assert_eq!(range.iter().count(), 500);
        assert!(!range.is_empty());
    }

    #[test]
    fn test_range_of_one() {
        let range = SerialRange::after(30500, 1).unwrap();
        assert_eq!(range.start, 30501);
        assert_eq!(range.end, 30501);
        assert_eq!(range.len(), 1);
    }

    #[test]
    fn test_range_rejects_non_positive_quantity() {
        assert!(matches!(
            SerialRange::after(30000, 0),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            SerialRange::after(30000, -3),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_range_overflow_is_error() {
        assert!(SerialRange::after(i64::MAX - 1, 5).is_err());
    }

    #[tokio::test]
    async fn test_reserve_range_locks_and_advances_tracker() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec_ok(0), exec_ok(1)])
            .append_query_results([vec![tracker_row(7, 30500)]])
            .into_connection();

        let allocator = SerialNumberAllocator::new(30000);
        let txn = db.begin().await.unwrap();
        let range = allocator.reserve_range(&txn, 7, 300).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(range, SerialRange { start: 30501, end: 30800 });

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("ON CONFLICT"));
        assert!(log.contains("FOR UPDATE"));
    }

    #[tokio::test]
    async fn test_reserve_range_rejects_zero_before_touching_db() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let allocator = SerialNumberAllocator::new(30000);
        let txn = db.begin().await.unwrap();
        let err = allocator.reserve_range(&txn, 7, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
