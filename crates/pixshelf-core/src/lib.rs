//! # pixshelf-core
//!
//! Core types, traits, and abstractions for the pixshelf artwork catalog.
//!
//! This crate provides the data model, error type and storage/upstream
//! trait definitions that the other pixshelf crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod refresh;
pub mod search;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, ReconcileStage, Result};
pub use models::*;
pub use refresh::*;
pub use search::*;
pub use traits::*;
