use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 核销应用（产品线）。由应用管理模块维护，这里只读
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "verification_apps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant_id: i64,
    pub app_name: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_batches::Entity")]
    CouponBatches,
}

impl Related<super::coupon_batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponBatches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
