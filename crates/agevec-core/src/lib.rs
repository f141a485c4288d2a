pub mod config;
pub mod error;
pub mod types;

pub use error::{AgevecError, AgevecResult};
pub use types::{Expectation, ManifestEntry, Vector};
