pub mod coupon_code;
pub mod jwt;

pub use coupon_code::CouponCodeFormat;
pub use jwt::*;
