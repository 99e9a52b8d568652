pub mod coupon_batches;
pub mod coupons;
pub mod serial_number_tracker;
pub mod verification_apps;

pub use coupon_batches as coupon_batch_entity;
pub use coupons as coupon_entity;
pub use serial_number_tracker as serial_number_tracker_entity;
pub use verification_apps as verification_app_entity;

pub use coupon_batches::BatchStatus;
pub use coupons::{CouponStatus, DiscountType};
