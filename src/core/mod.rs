pub mod config;
pub mod error;
pub mod obfuscate;
pub mod pipeline;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
