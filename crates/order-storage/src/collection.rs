//! Indexed collections over a key-value store.
//!
//! A collection keeps each record as JSON under `<prefix>:<id>` and tracks
//! every record key in an index set, because the store cannot enumerate keys
//! by type. Inserts and deletes touch both in one atomic batch; listing
//! scans the index and fetches the page of records with a single multi-get.

use crate::{Batch, KeyValueStore, StoreError};
use order_types::{Record, StorageKey};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

/// One page of records returned by [`Collection::find_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
	pub items: Vec<T>,
	/// Cursor for the next page; 0 when the index has been fully scanned.
	pub cursor: u64,
}

impl<T> Page<T> {
	pub fn is_exhausted(&self) -> bool {
		self.cursor == 0
	}
}

/// Typed, indexed collection of records.
pub struct Collection<T> {
	backend: Arc<dyn KeyValueStore>,
	key: StorageKey,
	_record: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
	fn clone(&self) -> Self {
		Self {
			backend: Arc::clone(&self.backend),
			key: self.key,
			_record: PhantomData,
		}
	}
}

impl<T: Record> Collection<T> {
	pub fn new(backend: Arc<dyn KeyValueStore>, key: StorageKey) -> Self {
		Self {
			backend,
			key,
			_record: PhantomData,
		}
	}

	/// Name of the index set, e.g. `orders`.
	pub fn index(&self) -> &'static str {
		self.key.as_str()
	}

	/// Storage key of the record with the given id, e.g. `order:42`.
	pub fn record_key(&self, id: u64) -> String {
		self.key.record_key(id)
	}

	/// Stores a new record and indexes it.
	///
	/// Fails with [`StoreError::AlreadyExists`] when a record with the same
	/// id is present; the stored record is left untouched in that case.
	pub async fn insert(&self, record: &T) -> Result<(), StoreError> {
		let key = self.record_key(record.record_id());
		let bytes = encode(record)?;

		let mut batch = Batch::new();
		batch.set_if_absent(&key, bytes).set_add(self.index(), &key);

		let replies = self.backend.exec(batch).await?;
		match replies.first() {
			Some(0) => Err(StoreError::AlreadyExists(key)),
			Some(_) => {
				tracing::debug!(key = %key, index = self.index(), "Inserted record");
				Ok(())
			},
			None => Err(StoreError::backend("EXEC", key, "empty transaction reply")),
		}
	}

	/// Loads the record with the given id.
	pub async fn find_by_id(&self, id: u64) -> Result<T, StoreError> {
		let key = self.record_key(id);
		match self.backend.get(&key).await? {
			Some(bytes) => decode(&key, &bytes),
			None => Err(StoreError::NotFound(key)),
		}
	}

	/// Overwrites an existing record. Never creates one.
	pub async fn update(&self, record: &T) -> Result<(), StoreError> {
		let key = self.record_key(record.record_id());
		let bytes = encode(record)?;

		if self.backend.set_if_exists(&key, bytes).await? {
			tracing::debug!(key = %key, "Updated record");
			Ok(())
		} else {
			Err(StoreError::NotFound(key))
		}
	}

	/// Removes the record with the given id and its index entry.
	pub async fn delete_by_id(&self, id: u64) -> Result<(), StoreError> {
		let key = self.record_key(id);

		let mut batch = Batch::new();
		batch.delete(&key).set_remove(self.index(), &key);

		let replies = self.backend.exec(batch).await?;
		match replies.first() {
			Some(0) => Err(StoreError::NotFound(key)),
			Some(_) => {
				tracing::debug!(key = %key, index = self.index(), "Deleted record");
				Ok(())
			},
			None => Err(StoreError::backend("EXEC", key, "empty transaction reply")),
		}
	}

	/// Returns up to about `page_size` records starting at `cursor`.
	///
	/// Order is unspecified and pages are not stable under concurrent writes:
	/// a record may be missed or seen twice across pages. Duplicates within
	/// one page are collapsed, and index entries whose record vanished
	/// between the scan and the fetch are skipped.
	pub async fn find_all(&self, page_size: usize, cursor: u64) -> Result<Page<T>, StoreError> {
		let scan = self
			.backend
			.set_scan(self.index(), cursor, page_size)
			.await?;

		if scan.members.is_empty() {
			return Ok(Page {
				items: Vec::new(),
				cursor: scan.cursor,
			});
		}

		let mut seen = HashSet::with_capacity(scan.members.len());
		let keys: Vec<String> = scan
			.members
			.into_iter()
			.filter(|key| seen.insert(key.clone()))
			.collect();

		let values = self.backend.multi_get(&keys).await?;

		let mut items = Vec::with_capacity(keys.len());
		for (key, value) in keys.iter().zip(values) {
			match value {
				Some(bytes) => items.push(decode(key, &bytes)?),
				None => {
					tracing::warn!(key = %key, index = self.index(), "Index entry without record, skipping");
				},
			}
		}

		Ok(Page {
			items,
			cursor: scan.cursor,
		})
	}
}

fn encode<T: Record>(record: &T) -> Result<Vec<u8>, StoreError> {
	serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: Record>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
	serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
		key: key.to_string(),
		message: e.to_string(),
	})
}
