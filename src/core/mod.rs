pub mod config;
pub mod engine;
pub mod error;
pub mod types;

pub use config::{ConfigLoader, EngineConfig};
pub use error::AppError;
pub use types::*;
