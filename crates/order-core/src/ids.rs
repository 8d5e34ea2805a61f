//! Order identifier generation.

use order_types::OrderId;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of identifiers for new orders.
pub trait IdGenerator: Send + Sync {
	fn next_id(&self) -> OrderId;
}

/// Draws identifiers uniformly from the full 64-bit range using the
/// thread-local cryptographically secure generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
	fn next_id(&self) -> OrderId {
		rand::thread_rng().gen()
	}
}

/// Hands out consecutive identifiers starting at a fixed value.
#[derive(Debug)]
pub struct SequenceIdGenerator {
	next: AtomicU64,
}

impl SequenceIdGenerator {
	pub fn starting_at(first: OrderId) -> Self {
		Self {
			next: AtomicU64::new(first),
		}
	}
}

impl IdGenerator for SequenceIdGenerator {
	fn next_id(&self) -> OrderId {
		self.next.fetch_add(1, Ordering::Relaxed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	#[test]
	fn test_sequence_is_consecutive() {
		let ids = SequenceIdGenerator::starting_at(100);
		assert_eq!(ids.next_id(), 100);
		assert_eq!(ids.next_id(), 101);
		assert_eq!(ids.next_id(), 102);
	}

	#[test]
	fn test_random_ids_are_spread() {
		let ids = RandomIdGenerator;
		let drawn: HashSet<_> = (0..64).map(|_| ids.next_id()).collect();
		assert!(drawn.len() > 60);
	}
}
