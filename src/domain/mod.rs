//! Domain layer for archcheck
//!
//! CDD Principle: Domain Model - Pure structural facts about a compiled codebase
//! - Contains the immutable model, the element views rules operate on, and evaluation results
//! - Independent of how models are loaded or how results are rendered
//! - Expresses the ubiquitous language of classes, members, annotations and accesses

pub mod element;
pub mod model;
pub mod results;

// Re-export main domain types for convenience
pub use element::*;
pub use model::*;
pub use results::*;
