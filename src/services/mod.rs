pub mod batch_lifecycle;
pub mod batch_service;
pub mod coupon_materializer;
pub mod serial_allocator;

pub use batch_lifecycle::BatchTransition;
pub use batch_service::BatchService;
pub use coupon_materializer::{CouponDefaults, CouponMaterializer};
pub use serial_allocator::{SerialNumberAllocator, SerialRange};
