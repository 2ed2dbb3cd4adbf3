//! Core domain types
//!
//! Pure types with no I/O dependencies: port names, control lines,
//! PTT configuration profiles and the error vocabulary.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
