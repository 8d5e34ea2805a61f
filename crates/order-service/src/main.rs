//! Main entry point for the order service.
//!
//! Loads configuration, connects the configured key-value backend and serves
//! the order API until the process receives an interrupt or termination
//! signal.

use clap::Parser;
use order_config::{Config, StorageConfig};
use order_core::OrderService;
use order_storage::{get_all_implementations, KeyValueStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod apis;
mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the order service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Connects the primary storage backend
/// 5. Serves the API until a shutdown signal arrives
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let store = build_store(&config.storage)?;
	store.ping().await?;
	tracing::info!("Connected to '{}' storage", config.storage.primary);

	let orders = OrderService::new(Arc::clone(&store));

	let shutdown = CancellationToken::new();
	tokio::spawn(watch_signals(shutdown.clone()));

	server::start_server(config.api, orders, shutdown).await?;

	// Connection tasks cut off by the grace period may still hold clones of
	// the client until they finish.
	drop(store);
	tracing::info!("Stopped order service");
	Ok(())
}

/// Creates the primary storage backend named in the configuration.
fn build_store(
	config: &StorageConfig,
) -> Result<Arc<dyn KeyValueStore>, Box<dyn std::error::Error + Send + Sync>> {
	let factory = get_all_implementations()
		.into_iter()
		.find(|(name, _)| *name == config.primary)
		.map(|(_, factory)| factory)
		.ok_or_else(|| format!("Unknown storage implementation '{}'", config.primary))?;

	let table = config.primary_config().ok_or_else(|| {
		format!(
			"Storage implementation '{}' has no configuration",
			config.primary
		)
	})?;

	let store = factory(table)?;
	Ok(Arc::from(store))
}

/// Cancels `shutdown` on Ctrl+C or, on Unix, SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{signal, SignalKind};
		match signal(SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			},
			Err(e) => {
				tracing::error!("Failed to listen for SIGTERM: {}", e);
				std::future::pending::<()>().await;
			},
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
		_ = terminate => tracing::info!("Received SIGTERM, shutting down"),
	}

	shutdown.cancel();
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn storage(primary: &str, table: &str) -> StorageConfig {
		let mut implementations = HashMap::new();
		implementations.insert(primary.to_string(), toml::from_str(table).unwrap());
		StorageConfig {
			primary: primary.to_string(),
			implementations,
		}
	}

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["orders"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");

		let args = Args::parse_from(["orders", "-c", "prod.toml", "--log-level", "debug"]);
		assert_eq!(args.config, PathBuf::from("prod.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_memory_store() {
		let store = build_store(&storage("memory", "")).unwrap();
		assert!(store.ping().await.is_ok());
	}

	#[test]
	fn test_build_unknown_store() {
		let err = build_store(&storage("etcd", "")).err().unwrap();
		assert!(err.to_string().contains("etcd"));
	}

	#[test]
	fn test_build_redis_store_requires_url() {
		assert!(build_store(&storage("redis", "")).is_err());
		assert!(build_store(&storage("redis", "url = \"http://localhost\"")).is_err());
		assert!(build_store(&storage("redis", "url = \"rediss://cache:6380\"")).is_err());
		assert!(build_store(&storage("redis", "url = \"redis://127.0.0.1:6379\"")).is_ok());
	}

	#[tokio::test]
	async fn test_config_file_wires_store() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"
[service]
id = "orders-test"

[storage]
primary = "memory"

[storage.implementations.memory]

[api]
port = 8081
"#
		)
		.unwrap();

		let config = Config::from_file(file.path()).await.unwrap();
		assert_eq!(config.api.port, 8081);
		assert_eq!(config.api.shutdown_grace_seconds, 10);

		let store = build_store(&config.storage).unwrap();
		let orders = OrderService::new(store);
		assert!(orders.list(None).await.unwrap().items.is_empty());
	}
}
