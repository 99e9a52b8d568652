pub mod batch;

pub use batch::batch_config;
