use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 券状态。本模块只产生 generated 与 printed，其余由核销流程写入
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "coupon_status")]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    #[sea_orm(string_value = "generated")]
    Generated,
    #[sea_orm(string_value = "printed")]
    Printed,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "scanned")]
    Scanned,
    #[sea_orm(string_value = "redeemed")]
    Redeemed,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl std::fmt::Display for CouponStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CouponStatus::Generated => write!(f, "generated"),
            CouponStatus::Printed => write!(f, "printed"),
            CouponStatus::Active => write!(f, "active"),
            CouponStatus::Scanned => write!(f, "scanned"),
            CouponStatus::Redeemed => write!(f, "redeemed"),
            CouponStatus::Expired => write!(f, "expired"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "discount_type")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "flat")]
    Flat,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::Flat => write!(f, "flat"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: i64,
    pub verification_app_id: i64,
    pub batch_id: i64,
    pub coupon_code: String,
    pub serial_number: i64,
    pub status: CouponStatus,
    pub discount_type: DiscountType,
    /// 百分比 (0-100) 或金额 (分)
    pub discount_value: i64,
    pub expiry_date: DateTime<Utc>,
    pub printed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::coupon_batches::Entity",
        from = "Column::BatchId",
        to = "super::coupon_batches::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Batch,
}

impl Related<super::coupon_batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
