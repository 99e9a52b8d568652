//! 批量生成券记录
//!
//! 按序列号升序分块写入，每块一条多行 INSERT，全部在调用方事务中执行。

use crate::config::CouponConfig;
use crate::entities::{CouponStatus, DiscountType, coupon_batch_entity as batches, coupon_entity as coupons};
use crate::error::{AppError, AppResult};
use crate::services::serial_allocator::SerialRange;
use crate::utils::CouponCodeFormat;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseTransaction, EntityTrait, Set};

/// 新券的默认优惠字段，由奖励活动在后续流程中覆盖
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponDefaults {
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub validity_days: i64,
}

impl From<&CouponConfig> for CouponDefaults {
    fn from(config: &CouponConfig) -> Self {
        Self {
            discount_type: config.default_discount_type,
            discount_value: config.default_discount_value,
            validity_days: config.validity_days,
        }
    }
}

#[derive(Clone)]
pub struct CouponMaterializer {
    codec: CouponCodeFormat,
    chunk_size: usize,
    defaults: CouponDefaults,
}

impl CouponMaterializer {
    pub fn new(codec: CouponCodeFormat, chunk_size: usize, defaults: CouponDefaults) -> Self {
        Self {
            codec,
            chunk_size: chunk_size.max(1),
            defaults,
        }
    }

    /// 为区间内每个序列号写入一张券，返回写入行数
    pub async fn generate(
        &self,
        txn: &DatabaseTransaction,
        batch: &batches::Model,
        range: SerialRange,
    ) -> AppResult<i64> {
        if range.is_empty() {
            return Err(AppError::ValidationError(format!(
                "Empty serial range {}..={} for batch {}",
                range.start, range.end, batch.id
            )));
        }
        let expiry_date = Utc::now() + Duration::days(self.defaults.validity_days);
        let mut inserted: u64 = 0;

        for (chunk_start, chunk_end) in serial_chunks(range, self.chunk_size) {
            let rows = (chunk_start..=chunk_end)
                .map(|serial| self.build_row(batch, serial, expiry_date))
                .collect::<AppResult<Vec<_>>>()?;

            inserted += coupons::Entity::insert_many(rows)
                .exec_without_returning(txn)
                .await?;
        }

        let inserted = inserted as i64;
        if inserted != range.len() {
            // 触发回滚，区间与券数必须一致
            return Err(AppError::InternalError(format!(
                "Batch {} expected {} coupons but inserted {inserted}",
                batch.id,
                range.len()
            )));
        }

        log::info!(
            "Materialized {inserted} coupons for batch {} ({}..={})",
            batch.id,
            range.start,
            range.end
        );

        Ok(inserted)
    }

    fn build_row(
        &self,
        batch: &batches::Model,
        serial_number: i64,
        expiry_date: DateTime<Utc>,
    ) -> AppResult<coupons::ActiveModel> {
        Ok(coupons::ActiveModel {
            tenant_id: Set(batch.tenant_id),
            verification_app_id: Set(batch.verification_app_id),
            batch_id: Set(batch.id),
            coupon_code: Set(self.codec.encode(serial_number)?),
            serial_number: Set(serial_number),
            status: Set(CouponStatus::Generated),
            discount_type: Set(self.defaults.discount_type),
            discount_value: Set(self.defaults.discount_value),
            expiry_date: Set(expiry_date),
            ..Default::default()
        })
    }
}

/// 把区间切成不超过 `chunk_size` 的连续子区间，升序
pub fn serial_chunks(range: SerialRange, chunk_size: usize) -> Vec<(i64, i64)> {
    let step = chunk_size.max(1) as i64;
    let mut chunks = Vec::new();
    let mut start = range.start;
    while start <= range.end {
        let end = range.end.min(start.saturating_add(step - 1));
        chunks.push((start, end));
        if end == range.end {
            break;
        }
        start = end + 1;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BatchStatus;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, TransactionTrait};

    fn draft_batch() -> batches::Model {
        batches::Model {
            id: 11,
            tenant_id: 3,
            verification_app_id: 5,
            batch_name: "B1".into(),
            dealer_name: Some("Dealer".into()),
            zone: Some("North".into()),
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

    fn materializer(chunk_size: usize) -> CouponMaterializer {
        CouponMaterializer::new(
            CouponCodeFormat::V1,
            chunk_size,
            CouponDefaults {
                discount_type: DiscountType::Percentage,
                discount_value: 0,
                validity_days: 365,
            },
        )
    }

    #[test]
    fn test_chunks_cover_range_exactly() {
        let range = SerialRange { start: 30001, end: 32500 };
        let chunks = serial_chunks(range, 1000);
        assert_eq!(
            chunks,
            vec![(30001, 31000), (31001, 32000), (32001, 32500)]
        );
    }

    #[test]
    fn test_single_chunk_when_range_smaller_than_chunk() {
        let range = SerialRange { start: 30501, end: 30800 };
        assert_eq!(serial_chunks(range, 1000), vec![(30501, 30800)]);
    }

    #[test]
    fn test_chunks_are_contiguous() {
        let range = SerialRange { start: 1, end: 9999 };
        let chunks = serial_chunks(range, 7);
        assert_eq!(chunks.first().unwrap().0, 1);
        assert_eq!(chunks.last().unwrap().1, 9999);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0);
        }
    }

    #[test]
    fn test_build_row_uses_codec_and_defaults() {
        let batch = draft_batch();
        let row = materializer(10)
            .build_row(&batch, 31001, Utc::now())
            .unwrap();
        assert_eq!(row.coupon_code, Set("CP-031001".to_string()));
        assert_eq!(row.serial_number, Set(31001));
        assert_eq!(row.batch_id, Set(11));
        assert_eq!(row.tenant_id, Set(3));
        assert_eq!(row.status, Set(CouponStatus::Generated));
    }

    #[tokio::test]
    async fn test_generate_issues_one_insert_per_chunk() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 200,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 100,
                },
            ])
            .into_connection();

        let txn = db.begin().await.unwrap();
        let inserted = materializer(200)
            .generate(&txn, &draft_batch(), SerialRange { start: 30501, end: 30800 })
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(inserted, 300);
        let log = format!("{:?}", db.into_transaction_log());
        assert_eq!(log.matches("INSERT INTO \\\"coupons\\\"").count(), 2);
        assert!(log.contains("CP-030501"));
        assert!(log.contains("CP-030800"));
    }

    #[tokio::test]
    async fn test_generate_short_insert_is_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 9,
            }])
            .into_connection();

        let txn = db.begin().await.unwrap();
        let err = materializer(100)
            .generate(&txn, &draft_batch(), SerialRange { start: 1, end: 10 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_range_without_writing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let txn = db.begin().await.unwrap();
        let err = materializer(100)
            .generate(&txn, &draft_batch(), SerialRange { start: 10, end: 9 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        drop(txn);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(!log.contains("INSERT"));
    }
}
