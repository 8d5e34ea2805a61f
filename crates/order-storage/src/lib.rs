//! Storage module for the order service.
//!
//! This module exposes the key-value primitives the service relies on
//! (conditional writes, multi-get, set membership and set scanning) behind
//! the [`KeyValueStore`] trait, and builds the indexed [`Collection`]
//! abstraction on top of them. Backends are pluggable: an in-memory store for
//! tests and development, and Redis for deployments.

use async_trait::async_trait;
use order_types::ImplementationRegistry;
use std::fmt;
use thiserror::Error;

pub mod collection;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod redis;
}

pub use collection::{Collection, Page};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The requested key does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// A conditional insert found the key already present.
	#[error("Already exists: {0}")]
	AlreadyExists(String),
	/// A store primitive or transaction failed.
	#[error("Backend error during {op} on '{key}': {message}")]
	Backend {
		op: &'static str,
		key: String,
		message: String,
	},
	/// Stored bytes could not be decoded into a record.
	#[error("Decode error for '{key}': {message}")]
	Decode { key: String, message: String },
	/// A record could not be encoded for storage.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Backend configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl StoreError {
	/// Wraps a backend failure with the operation and key it happened on.
	pub fn backend(op: &'static str, key: impl Into<String>, err: impl fmt::Display) -> Self {
		StoreError::Backend {
			op,
			key: key.into(),
			message: err.to_string(),
		}
	}
}

/// A single write queued in a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
	/// Write `value` under `key` only if the key does not exist.
	SetIfAbsent { key: String, value: Vec<u8> },
	/// Remove `key`.
	Delete { key: String },
	/// Add `member` to the set stored at `set`.
	SetAdd { set: String, member: String },
	/// Remove `member` from the set stored at `set`.
	SetRemove { set: String, member: String },
}

impl BatchOp {
	/// The key this op touches.
	pub fn key(&self) -> &str {
		match self {
			BatchOp::SetIfAbsent { key, .. } | BatchOp::Delete { key } => key,
			BatchOp::SetAdd { set, .. } | BatchOp::SetRemove { set, .. } => set,
		}
	}
}

/// An ordered group of writes committed together.
///
/// Ops are only queued locally; nothing reaches the store until the batch is
/// handed to [`KeyValueStore::exec`]. Dropping a batch discards it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
	ops: Vec<BatchOp>,
}

impl Batch {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_if_absent(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
		self.ops.push(BatchOp::SetIfAbsent {
			key: key.into(),
			value,
		});
		self
	}

	pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
		self.ops.push(BatchOp::Delete { key: key.into() });
		self
	}

	pub fn set_add(&mut self, set: impl Into<String>, member: impl Into<String>) -> &mut Self {
		self.ops.push(BatchOp::SetAdd {
			set: set.into(),
			member: member.into(),
		});
		self
	}

	pub fn set_remove(&mut self, set: impl Into<String>, member: impl Into<String>) -> &mut Self {
		self.ops.push(BatchOp::SetRemove {
			set: set.into(),
			member: member.into(),
		});
		self
	}

	pub fn ops(&self) -> &[BatchOp] {
		&self.ops
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}
}

/// One page of a set scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
	/// Cursor to resume the scan from; 0 once the scan is complete.
	pub cursor: u64,
	/// Members returned by this step. May be empty even when `cursor != 0`
	/// and may repeat members returned by earlier steps.
	pub members: Vec<String>,
}

/// Trait defining the low-level interface for key-value backends.
///
/// Implementations must be safe to share between request handlers; every
/// method takes `&self`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
	/// Checks that the backend is reachable.
	async fn ping(&self) -> Result<(), StoreError>;

	/// Returns the value stored at `key`, or `None` if absent.
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

	/// Returns the values for `keys` in order, `None` for absent keys.
	///
	/// Calling this with an empty slice is an error.
	async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

	/// Overwrites `key` only if it already exists. Returns whether it did.
	async fn set_if_exists(&self, key: &str, value: Vec<u8>) -> Result<bool, StoreError>;

	/// Scans up to roughly `count` members of `set` starting at `cursor`.
	async fn set_scan(&self, set: &str, cursor: u64, count: usize)
		-> Result<ScanPage, StoreError>;

	/// Commits all ops of `batch` atomically.
	///
	/// Returns one count per op, in order: keys written for `SetIfAbsent`,
	/// keys removed for `Delete`, members added or removed for the set ops.
	async fn exec(&self, batch: Batch) -> Result<Vec<u64>, StoreError>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn KeyValueStore>, StoreError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{memory, redis};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(redis::Registry::NAME, redis::Registry::factory()),
	]
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_batch_queues_ops_in_order() {
		let mut batch = Batch::new();
		batch
			.set_if_absent("order:1", b"{}".to_vec())
			.set_add("orders", "order:1");

		assert_eq!(batch.len(), 2);
		assert_eq!(
			batch.ops()[0],
			BatchOp::SetIfAbsent {
				key: "order:1".to_string(),
				value: b"{}".to_vec(),
			}
		);
		assert_eq!(batch.ops()[1].key(), "orders");
	}

	#[test]
	fn test_registered_implementations() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["memory", "redis"]);
	}

	#[test]
	fn test_backend_error_context() {
		let err = StoreError::backend("GET", "order:9", "connection reset");
		assert_eq!(
			err.to_string(),
			"Backend error during GET on 'order:9': connection reset"
		);
	}
}
