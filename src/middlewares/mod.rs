pub mod auth;
pub mod cors;

pub use auth::{AuthMiddleware, TenantAdmin};
pub use cors::create_cors;
