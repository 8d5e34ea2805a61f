//! State management for orders.
//!
//! Holds the status transition rules applied by the order service before a
//! mutated order is written back.

pub mod order;

pub use order::{is_valid_transition, parse_requested, transition, TransitionError};
