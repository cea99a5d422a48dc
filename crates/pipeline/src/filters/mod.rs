//! Filter implementations for the candidate pipeline.
//!
//! This module contains all the concrete filter implementations
//! that can be composed into a FilterPipeline.

pub mod already_rated;
pub mod item_type;

// Re-export for convenience
pub use already_rated::AlreadyRatedFilter;
pub use item_type::ItemTypeFilter;
