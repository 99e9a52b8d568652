use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 序列号区间与批次状态保持一致:
/// - draft: 区间为空
/// - code_assigned / activated: 区间完整且 end >= start
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            ALTER TABLE coupon_batches
                ADD CONSTRAINT chk_coupon_batches_total_positive
                CHECK (total_coupons > 0);

            ALTER TABLE coupon_batches
                ADD CONSTRAINT chk_coupon_batches_serial_range
                CHECK (
                    (batch_status = 'draft'
                        AND serial_number_start IS NULL
                        AND serial_number_end IS NULL)
                    OR
                    (batch_status <> 'draft'
                        AND serial_number_start IS NOT NULL
                        AND serial_number_end IS NOT NULL
                        AND serial_number_end >= serial_number_start)
                );
        "#;
        manager.get_connection().execute_unprepared(sql).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = r#"
            ALTER TABLE coupon_batches DROP CONSTRAINT IF EXISTS chk_coupon_batches_serial_range;
            ALTER TABLE coupon_batches DROP CONSTRAINT IF EXISTS chk_coupon_batches_total_positive;
        "#;
        manager.get_connection().execute_unprepared(sql).await?;
        Ok(())
    }
}
