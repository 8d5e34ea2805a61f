//! In-memory storage backend implementation.
//!
//! Emulates the Redis primitives the service needs on top of plain maps,
//! useful for testing and development scenarios where persistence is not
//! required. Sets are kept sorted and scanned by offset, so the cursor is
//! the number of members already visited.

use crate::{Batch, BatchOp, KeyValueStore, ScanPage, StoreError};
use async_trait::async_trait;
use order_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
	values: HashMap<String, Vec<u8>>,
	sets: HashMap<String, BTreeSet<String>>,
}

impl MemoryState {
	fn apply(&mut self, op: &BatchOp) -> u64 {
		match op {
			BatchOp::SetIfAbsent { key, value } => {
				if self.values.contains_key(key) {
					0
				} else {
					self.values.insert(key.clone(), value.clone());
					1
				}
			},
			BatchOp::Delete { key } => u64::from(self.values.remove(key).is_some()),
			BatchOp::SetAdd { set, member } => u64::from(
				self.sets
					.entry(set.clone())
					.or_default()
					.insert(member.clone()),
			),
			BatchOp::SetRemove { set, member } => {
				let removed = self
					.sets
					.get_mut(set)
					.is_some_and(|members| members.remove(member));
				if self.sets.get(set).is_some_and(BTreeSet::is_empty) {
					self.sets.remove(set);
				}
				u64::from(removed)
			},
		}
	}
}

/// In-memory storage implementation.
///
/// All state sits behind one lock, so a batch is applied without any other
/// operation observing it half done.
#[derive(Clone)]
pub struct MemoryStore {
	state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self {
			state: Arc::new(RwLock::new(MemoryState::default())),
		}
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl KeyValueStore for MemoryStore {
	async fn ping(&self) -> Result<(), StoreError> {
		Ok(())
	}

	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		let state = self.state.read().await;
		Ok(state.values.get(key).cloned())
	}

	async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
		if keys.is_empty() {
			return Err(StoreError::backend(
				"MGET",
				"",
				"wrong number of arguments: at least one key is required",
			));
		}

		let state = self.state.read().await;
		Ok(keys.iter().map(|k| state.values.get(k).cloned()).collect())
	}

	async fn set_if_exists(&self, key: &str, value: Vec<u8>) -> Result<bool, StoreError> {
		let mut state = self.state.write().await;
		match state.values.get_mut(key) {
			Some(slot) => {
				*slot = value;
				Ok(true)
			},
			None => Ok(false),
		}
	}

	async fn set_scan(
		&self,
		set: &str,
		cursor: u64,
		count: usize,
	) -> Result<ScanPage, StoreError> {
		let state = self.state.read().await;
		let Some(members) = state.sets.get(set) else {
			return Ok(ScanPage::default());
		};

		let start = usize::try_from(cursor)
			.map_err(|e| StoreError::backend("SSCAN", set, e))?;
		let page: Vec<String> = members
			.iter()
			.skip(start)
			.take(count.max(1))
			.cloned()
			.collect();

		let next = start + page.len();
		let cursor = if page.is_empty() || next >= members.len() {
			0
		} else {
			next as u64
		};

		Ok(ScanPage {
			cursor,
			members: page,
		})
	}

	async fn exec(&self, batch: Batch) -> Result<Vec<u64>, StoreError> {
		let mut state = self.state.write().await;
		Ok(batch.ops().iter().map(|op| state.apply(op)).collect())
	}
}

/// Configuration schema for MemoryStore.
pub struct MemoryStoreSchema;

impl ConfigSchema for MemoryStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no configuration
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn KeyValueStore>, StoreError> {
	MemoryStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;

	Ok(Box::new(MemoryStore::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
