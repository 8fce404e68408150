//! # Pestopia Common Library
//!
//! Shared code for the Pestopia services including:
//! - The fixed pest class label table (model output contract)
//! - Bootstrap configuration loading (TOML + defaults)
//! - Common error types

pub mod config;
pub mod error;
pub mod labels;

pub use error::{Error, Result};
pub use labels::{ClassLabels, PEST_CLASSES};
