pub mod batch;
pub mod common;
pub mod pagination;

pub use batch::*;
pub use common::*;
pub use pagination::*;
