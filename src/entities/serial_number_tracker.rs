use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 租户级序列号计数器
/// 说明:
/// - 每个租户一行 (tenant_id 唯一)
/// - last_serial_number 为已发出的最大序列号，只增不减
/// - 只允许在持有行锁 (FOR UPDATE) 的事务内读写
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "serial_number_tracker")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub tenant_id: i64,
    pub last_serial_number: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
