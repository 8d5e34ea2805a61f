//! Order status transitions.
//!
//! Orders move `Created -> Shipped -> Completed` and never back. Allowed
//! moves are listed in a static table; everything else is rejected.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use order_types::{OrderStatus, StatusKind};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors returned when a requested status change is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
	#[error("Unknown status '{0}', expected 'shipped' or 'completed'")]
	UnknownStatus(String),
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: StatusKind, to: StatusKind },
}

static TRANSITIONS: Lazy<HashMap<StatusKind, HashSet<StatusKind>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(StatusKind::Created, HashSet::from([StatusKind::Shipped]));
	m.insert(StatusKind::Shipped, HashSet::from([StatusKind::Completed]));
	m.insert(StatusKind::Completed, HashSet::new()); // terminal
	m
});

/// Checks if a state transition is valid.
pub fn is_valid_transition(from: StatusKind, to: StatusKind) -> bool {
	TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
}

/// Parses a requested status as sent by a client.
pub fn parse_requested(status: &str) -> Result<StatusKind, TransitionError> {
	status
		.parse::<StatusKind>()
		.map_err(|_| TransitionError::UnknownStatus(status.to_string()))
}

/// Computes the status that results from moving `current` to `requested`
/// at time `now`.
pub fn transition(
	current: &OrderStatus,
	requested: StatusKind,
	now: DateTime<Utc>,
) -> Result<OrderStatus, TransitionError> {
	let from = current.kind();
	let invalid = || TransitionError::InvalidTransition {
		from,
		to: requested,
	};

	if !is_valid_transition(from, requested) {
		return Err(invalid());
	}

	match requested {
		StatusKind::Shipped => Ok(OrderStatus::Shipped { shipped_at: now }),
		StatusKind::Completed => current
			.shipped_at()
			.map(|shipped_at| OrderStatus::Completed {
				shipped_at,
				completed_at: now,
			})
			.ok_or_else(invalid),
		StatusKind::Created => Err(invalid()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn at(hour: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
	}

	#[test]
	fn test_transition_table() {
		assert!(is_valid_transition(StatusKind::Created, StatusKind::Shipped));
		assert!(is_valid_transition(StatusKind::Shipped, StatusKind::Completed));

		assert!(!is_valid_transition(StatusKind::Created, StatusKind::Completed));
		assert!(!is_valid_transition(StatusKind::Shipped, StatusKind::Shipped));
		assert!(!is_valid_transition(StatusKind::Completed, StatusKind::Completed));
		assert!(!is_valid_transition(StatusKind::Completed, StatusKind::Created));
	}

	#[test]
	fn test_ship_then_complete() {
		let shipped = transition(&OrderStatus::Created, StatusKind::Shipped, at(9)).unwrap();
		assert_eq!(shipped, OrderStatus::Shipped { shipped_at: at(9) });

		let completed = transition(&shipped, StatusKind::Completed, at(17)).unwrap();
		assert_eq!(
			completed,
			OrderStatus::Completed {
				shipped_at: at(9),
				completed_at: at(17),
			}
		);
	}

	#[test]
	fn test_complete_before_ship_rejected() {
		let err = transition(&OrderStatus::Created, StatusKind::Completed, at(9)).unwrap_err();
		assert_eq!(
			err,
			TransitionError::InvalidTransition {
				from: StatusKind::Created,
				to: StatusKind::Completed,
			}
		);
	}

	#[test]
	fn test_repeat_transitions_rejected() {
		let shipped = OrderStatus::Shipped { shipped_at: at(9) };
		assert!(transition(&shipped, StatusKind::Shipped, at(10)).is_err());

		let completed = OrderStatus::Completed {
			shipped_at: at(9),
			completed_at: at(12),
		};
		for requested in [StatusKind::Created, StatusKind::Shipped, StatusKind::Completed] {
			assert!(transition(&completed, requested, at(13)).is_err());
		}
	}

	#[test]
	fn test_parse_requested() {
		assert_eq!(parse_requested("shipped"), Ok(StatusKind::Shipped));
		assert_eq!(
			parse_requested("returned"),
			Err(TransitionError::UnknownStatus("returned".to_string()))
		);
	}
}
