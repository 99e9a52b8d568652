use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

/// 核销应用（产品线），由外部模块维护，这里只建表保证外键成立
#[derive(DeriveIden)]
enum VerificationApps {
    Table,
    Id,
    TenantId,
    AppName,
    CreatedAt,
}

/// 每个租户一行的序列号计数器
#[derive(DeriveIden)]
enum SerialNumberTracker {
    Table,
    Id,
    TenantId,
    LastSerialNumber,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CouponBatches {
    Table,
    Id,
    TenantId,
    VerificationAppId,
    BatchName,
    DealerName,
    Zone,
    TotalCoupons,
    SerialNumberStart,
    SerialNumberEnd,
    BatchStatus,
    ActivatedAt,
    ActivationNote,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Coupons {
    Table,
    Id,
    TenantId,
    VerificationAppId,
    BatchId,
    CouponCode,
    SerialNumber,
    Status,
    DiscountType,
    DiscountValue,
    ExpiryDate,
    PrintedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // enums
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("batch_status"))
                    .values(vec![
                        Alias::new("draft"),
                        Alias::new("code_assigned"),
                        Alias::new("activated"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("coupon_status"))
                    .values(vec![
                        Alias::new("generated"),
                        Alias::new("printed"),
                        Alias::new("active"),
                        Alias::new("scanned"),
                        Alias::new("redeemed"),
                        Alias::new("expired"),
                    ])
                    .to_owned(),
            )
            .await?;
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("discount_type"))
                    .values(vec![Alias::new("percentage"), Alias::new("flat")])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VerificationApps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VerificationApps::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(VerificationApps::TenantId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationApps::AppName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VerificationApps::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_verification_apps_tenant")
                    .table(VerificationApps::Table)
                    .col(VerificationApps::TenantId)
                    .to_owned(),
            )
            .await?;

        // 序列号计数器
        manager
            .create_table(
                Table::create()
                    .table(SerialNumberTracker::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SerialNumberTracker::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SerialNumberTracker::TenantId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SerialNumberTracker::LastSerialNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SerialNumberTracker::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(SerialNumberTracker::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // ON CONFLICT (tenant_id) 依赖该唯一索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_serial_number_tracker_tenant_unique")
                    .table(SerialNumberTracker::Table)
                    .col(SerialNumberTracker::TenantId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 批次表
        manager
            .create_table(
                Table::create()
                    .table(CouponBatches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CouponBatches::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CouponBatches::TenantId).big_integer().not_null())
                    .col(
                        ColumnDef::new(CouponBatches::VerificationAppId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CouponBatches::BatchName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CouponBatches::DealerName).string_len(255).null())
                    .col(ColumnDef::new(CouponBatches::Zone).string_len(100).null())
                    .col(
                        ColumnDef::new(CouponBatches::TotalCoupons)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CouponBatches::SerialNumberStart)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CouponBatches::SerialNumberEnd)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CouponBatches::BatchStatus)
                            .custom(Alias::new("batch_status"))
                            .not_null()
                            .default(Expr::cust("'draft'::batch_status")),
                    )
                    .col(
                        ColumnDef::new(CouponBatches::ActivatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(CouponBatches::ActivationNote).text().null())
                    .col(
                        ColumnDef::new(CouponBatches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(CouponBatches::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupon_batches_verification_app")
                            .from(CouponBatches::Table, CouponBatches::VerificationAppId)
                            .to(VerificationApps::Table, VerificationApps::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_coupon_batches_tenant_status")
                    .table(CouponBatches::Table)
                    .col(CouponBatches::TenantId)
                    .col(CouponBatches::BatchStatus)
                    .to_owned(),
            )
            .await?;

        // 优惠券表
        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Coupons::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Coupons::TenantId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Coupons::VerificationAppId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Coupons::BatchId).big_integer().not_null())
                    .col(ColumnDef::new(Coupons::CouponCode).string_len(32).not_null())
                    .col(ColumnDef::new(Coupons::SerialNumber).big_integer().not_null())
                    .col(
                        ColumnDef::new(Coupons::Status)
                            .custom(Alias::new("coupon_status"))
                            .not_null()
                            .default(Expr::cust("'generated'::coupon_status")),
                    )
                    .col(
                        ColumnDef::new(Coupons::DiscountType)
                            .custom(Alias::new("discount_type"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::DiscountValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Coupons::ExpiryDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::PrintedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Coupons::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .col(
                        ColumnDef::new(Coupons::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coupons_batch")
                            .from(Coupons::Table, Coupons::BatchId)
                            .to(CouponBatches::Table, CouponBatches::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一租户内序列号、券码唯一
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_coupons_tenant_serial_unique")
                    .table(Coupons::Table)
                    .col(Coupons::TenantId)
                    .col(Coupons::SerialNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_coupons_tenant_code_unique")
                    .table(Coupons::Table)
                    .col(Coupons::TenantId)
                    .col(Coupons::CouponCode)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_coupons_batch_status")
                    .table(Coupons::Table)
                    .col(Coupons::BatchId)
                    .col(Coupons::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Coupons::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(CouponBatches::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(SerialNumberTracker::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(VerificationApps::Table)
                    .to_owned(),
            )
            .await?;
        for name in ["discount_type", "coupon_status", "batch_status"] {
            manager
                .drop_type(Type::drop().if_exists().name(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
