//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every backend module provides a `Registry` struct implementing this trait,
/// declaring the name it is configured under and the factory that builds it.
pub trait ImplementationRegistry {
	/// The key used in the TOML configuration, e.g. `"redis"` for
	/// `[storage.implementations.redis]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
