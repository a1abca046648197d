pub mod analyze;
pub mod config;
pub mod env_files;
pub mod error;
pub mod guidelines;
pub mod x_client;

pub use error::{Error, Result};
