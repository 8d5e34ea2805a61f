//! Common types for the order service.
//!
//! This crate defines the domain model, API bodies, storage keys and the
//! configuration validation primitives shared by every other crate in the
//! workspace.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Order domain model.
pub mod order;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Storage keys and the record trait for indexed collections.
pub mod storage;
/// Configuration validation types for backend configuration tables.
pub mod validation;

pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use validation::*;
