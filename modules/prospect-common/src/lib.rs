pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, RefreshSettings};
pub use error::RefreshError;
pub use types::*;
