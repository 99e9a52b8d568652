use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{BatchStatus, CouponStatus, DiscountType, coupon_batch_entity, coupon_entity};

use super::PaginatedResponse;

/// 创建批次请求；product_id 即核销应用 ID
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBatchRequest {
    pub product_id: i64,
    pub batch_name: String,
    pub dealer_name: Option<String>,
    pub zone: Option<String>,
    pub total_coupons: i64,
}

/// 分配券码请求，quantity 缺省时使用批次申请数量
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AssignCodesRequest {
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ActivateBatchRequest {
    pub note: Option<String>,
}

/// 批次列表查询参数
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchListQuery {
    pub status: Option<BatchStatus>,
    pub product_id: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CouponListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// 批次下各状态的券数量，total 为实际生成的行数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CouponStatusCounts {
    pub total: i64,
    pub generated: i64,
    pub printed: i64,
    pub active: i64,
    pub scanned: i64,
    pub redeemed: i64,
    pub expired: i64,
}

impl CouponStatusCounts {
    pub fn add(&mut self, status: CouponStatus, count: i64) {
        let slot = match status {
            CouponStatus::Generated => &mut self.generated,
            CouponStatus::Printed => &mut self.printed,
            CouponStatus::Active => &mut self.active,
            CouponStatus::Scanned => &mut self.scanned,
            CouponStatus::Redeemed => &mut self.redeemed,
            CouponStatus::Expired => &mut self.expired,
        };
        *slot += count;
        self.total += count;
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResponse {
    pub id: i64,
    pub product_id: i64,
    pub batch_name: String,
    pub dealer_name: Option<String>,
    pub zone: Option<String>,
    /// 申请数量
    pub total_coupons: i64,
    pub serial_number_start: Option<i64>,
    pub serial_number_end: Option<i64>,
    pub batch_status: BatchStatus,
    pub activation_note: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub coupon_counts: CouponStatusCounts,
}

impl BatchResponse {
    pub fn new(m: coupon_batch_entity::Model, coupon_counts: CouponStatusCounts) -> Self {
        BatchResponse {
            id: m.id,
            product_id: m.verification_app_id,
            batch_name: m.batch_name,
            dealer_name: m.dealer_name,
            zone: m.zone,
            total_coupons: m.total_coupons,
            serial_number_start: m.serial_number_start,
            serial_number_end: m.serial_number_end,
            batch_status: m.batch_status,
            activation_note: m.activation_note,
            activated_at: m.activated_at,
            created_at: m.created_at.unwrap_or_else(Utc::now),
            coupon_counts,
        }
    }
}

impl From<coupon_batch_entity::Model> for BatchResponse {
    fn from(m: coupon_batch_entity::Model) -> Self {
        BatchResponse::new(m, CouponStatusCounts::default())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssignCodesResponse {
    pub batch_id: i64,
    pub serial_number_start: i64,
    pub serial_number_end: i64,
    pub coupons_generated: i64,
    pub batch_status: BatchStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivateBatchResponse {
    pub batch_id: i64,
    pub batch_status: BatchStatus,
    pub coupons_printed: i64,
    pub activation_note: Option<String>,
    pub activated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CouponResponse {
    pub id: i64,
    pub coupon_code: String,
    pub serial_number: i64,
    pub status: CouponStatus,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub expiry_date: DateTime<Utc>,
    pub printed_at: Option<DateTime<Utc>>,
}

impl From<coupon_entity::Model> for CouponResponse {
    fn from(m: coupon_entity::Model) -> Self {
        CouponResponse {
            id: m.id,
            coupon_code: m.coupon_code,
            serial_number: m.serial_number,
            status: m.status,
            discount_type: m.discount_type,
            discount_value: m.discount_value,
            expiry_date: m.expiry_date,
            printed_at: m.printed_at,
        }
    }
}

pub type BatchPageResponse = PaginatedResponse<BatchResponse>;
pub type CouponPageResponse = PaginatedResponse<CouponResponse>;
