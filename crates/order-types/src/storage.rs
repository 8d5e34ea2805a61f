//! Storage-related types for the order service.

use serde::{de::DeserializeOwned, Serialize};

/// Collections kept in the key-value store.
///
/// Each collection stores its records under `<record_prefix>:<id>` and keeps
/// the set of those keys in an index set named after the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Customer orders.
	Orders,
}

impl StorageKey {
	/// Returns the name of the index set for this collection.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
		}
	}

	/// Returns the prefix used for record keys of this collection.
	pub fn record_prefix(&self) -> &'static str {
		match self {
			StorageKey::Orders => "order",
		}
	}

	/// Builds the record key for the given identifier, e.g. `order:42`.
	pub fn record_key(&self, id: u64) -> String {
		format!("{}:{}", self.record_prefix(), id)
	}
}

/// A value that can live in an indexed collection.
///
/// The record's identifier determines its storage key, so updates never need
/// the identifier passed separately.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
	fn record_id(&self) -> u64;
}
