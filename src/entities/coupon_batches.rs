use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 批次生命周期状态，只能 draft -> code_assigned -> activated 单向推进
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "batch_status")]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "code_assigned")]
    CodeAssigned,
    #[sea_orm(string_value = "activated")]
    Activated,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchStatus::Draft => write!(f, "draft"),
            BatchStatus::CodeAssigned => write!(f, "code_assigned"),
            BatchStatus::Activated => write!(f, "activated"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "coupon_batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: i64,
    pub verification_app_id: i64,
    pub batch_name: String,
    pub dealer_name: Option<String>,
    pub zone: Option<String>,
    /// 创建时申请的数量；实际生成的券数以 coupons 表为准
    pub total_coupons: i64,
    pub serial_number_start: Option<i64>,
    pub serial_number_end: Option<i64>,
    pub batch_status: BatchStatus,
    pub activated_at: Option<DateTime<Utc>>,
    pub activation_note: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Reserved serial range, present once codes are assigned.
    pub fn serial_range(&self) -> Option<(i64, i64)> {
        match (self.serial_number_start, self.serial_number_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupons::Entity")]
    Coupons,
    #[sea_orm(
        belongs_to = "super::verification_apps::Entity",
        from = "Column::VerificationAppId",
        to = "super::verification_apps::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    VerificationApp,
}

impl Related<super::coupons::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coupons.def()
    }
}

impl Related<super::verification_apps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VerificationApp.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
