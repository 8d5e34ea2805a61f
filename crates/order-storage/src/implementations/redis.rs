//! Redis storage backend implementation.
//!
//! Maps the [`KeyValueStore`] primitives onto Redis commands. Batches are sent
//! as a `MULTI`/`EXEC` pipeline, so either every queued command is applied or
//! none is. There is no `WATCH`, so concurrent writers to the same key are
//! not detected.

use crate::{Batch, BatchOp, KeyValueStore, ScanPage, StoreError};
use ::redis::aio::ConnectionManager;
use ::redis::{Client, Value};
use async_trait::async_trait;
use order_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use tokio::sync::OnceCell;

/// Redis storage implementation.
///
/// The connection is opened lazily on first use and then shared by every
/// caller; `ConnectionManager` multiplexes requests and reconnects on
/// failure.
pub struct RedisStore {
	client: Client,
	connection: OnceCell<ConnectionManager>,
}

impl RedisStore {
	/// Creates a store for the given `redis://` URL without connecting.
	pub fn new(url: &str) -> Result<Self, StoreError> {
		let client = Client::open(url).map_err(|e| StoreError::Configuration(e.to_string()))?;
		Ok(Self {
			client,
			connection: OnceCell::new(),
		})
	}

	async fn connection(&self) -> Result<ConnectionManager, StoreError> {
		self.connection
			.get_or_try_init(|| async {
				tracing::debug!("Opening Redis connection");
				ConnectionManager::new(self.client.clone()).await
			})
			.await
			.cloned()
			.map_err(|e| StoreError::backend("CONNECT", "", e))
	}
}

#[async_trait]
impl KeyValueStore for RedisStore {
	async fn ping(&self) -> Result<(), StoreError> {
		let mut conn = self.connection().await?;
		let _: String = ::redis::cmd("PING")
			.query_async(&mut conn)
			.await
			.map_err(|e| StoreError::backend("PING", "", e))?;
		Ok(())
	}

	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
		let mut conn = self.connection().await?;
		let value: Option<Vec<u8>> = ::redis::cmd("GET")
			.arg(key)
			.query_async(&mut conn)
			.await
			.map_err(|e| StoreError::backend("GET", key, e))?;
		Ok(value)
	}

	async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
		if keys.is_empty() {
			return Err(StoreError::backend(
				"MGET",
				"",
				"wrong number of arguments: at least one key is required",
			));
		}

		let mut conn = self.connection().await?;
		let mut cmd = ::redis::cmd("MGET");
		for key in keys {
			cmd.arg(key);
		}

		let values: Vec<Option<Vec<u8>>> = cmd
			.query_async(&mut conn)
			.await
			.map_err(|e| StoreError::backend("MGET", keys.join(","), e))?;
		Ok(values)
	}

	async fn set_if_exists(&self, key: &str, value: Vec<u8>) -> Result<bool, StoreError> {
		let mut conn = self.connection().await?;
		// SET .. XX replies OK when written and nil when the key is missing
		let reply: Value = ::redis::cmd("SET")
			.arg(key)
			.arg(value)
			.arg("XX")
			.query_async(&mut conn)
			.await
			.map_err(|e| StoreError::backend("SET XX", key, e))?;
		Ok(!matches!(reply, Value::Nil))
	}

	async fn set_scan(
		&self,
		set: &str,
		cursor: u64,
		count: usize,
	) -> Result<ScanPage, StoreError> {
		let mut conn = self.connection().await?;
		let (cursor, members): (u64, Vec<String>) = ::redis::cmd("SSCAN")
			.arg(set)
			.arg(cursor)
			.arg("COUNT")
			.arg(count.max(1))
			.query_async(&mut conn)
			.await
			.map_err(|e| StoreError::backend("SSCAN", set, e))?;
		Ok(ScanPage { cursor, members })
	}

	async fn exec(&self, batch: Batch) -> Result<Vec<u64>, StoreError> {
		if batch.is_empty() {
			return Ok(Vec::new());
		}

		let mut pipe = ::redis::pipe();
		pipe.atomic();
		for op in batch.ops() {
			match op {
				BatchOp::SetIfAbsent { key, value } => {
					pipe.cmd("SETNX").arg(key).arg(value.as_slice());
				},
				BatchOp::Delete { key } => {
					pipe.cmd("DEL").arg(key);
				},
				BatchOp::SetAdd { set, member } => {
					pipe.cmd("SADD").arg(set).arg(member);
				},
				BatchOp::SetRemove { set, member } => {
					pipe.cmd("SREM").arg(set).arg(member);
				},
			}
		}

		let mut conn = self.connection().await?;
		let first_key = batch.ops()[0].key().to_string();
		let replies: Vec<u64> = pipe
			.query_async(&mut conn)
			.await
			.map_err(|e| StoreError::backend("EXEC", first_key, e))?;
		Ok(replies)
	}
}

/// Configuration schema for RedisStore.
pub struct RedisStoreSchema;

impl ConfigSchema for RedisStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				let url = value.as_str().unwrap_or_default();
				// No TLS support is compiled in, so rediss:// is refused here
				if url.starts_with("redis://") {
					Ok(())
				} else {
					Err(format!("expected a redis:// URL, got '{}'", url))
				}
			})],
			vec![],
		);
		schema.validate(config)
	}
}

/// Factory function to create a Redis storage backend from configuration.
///
/// Configuration parameters:
/// - `url`: connection URL, e.g. `redis://127.0.0.1:6379/0` (required)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn KeyValueStore>, StoreError> {
	RedisStoreSchema
		.validate(config)
		.map_err(|e| StoreError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StoreError::Configuration("url is required".into()))?;

	Ok(Box::new(RedisStore::new(url)?))
}

/// Registry for the Redis storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "redis";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}
