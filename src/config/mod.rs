//! Configuration module for link harvesting
//!
//! This module provides the `HarvestConfig` struct and its type-safe builder
//! with validation and the defaults observed on the target site.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::{HarvestConfigBuilder, WithStore};
pub use types::HarvestConfig;
