//! Order domain types.
//!
//! An order moves through `Created -> Shipped -> Completed`. The lifecycle
//! timestamps travel with the status variant that introduces them, so an
//! order can never carry a completion time without a shipping time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::storage::Record;

/// Numeric order identifier as exposed over the API and used in storage keys.
pub type OrderId = u64;

/// A single line of an order. Never inspected by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
	pub item_id: Uuid,
	pub quantity: u32,
	/// Unit price in minor currency units.
	pub price: u64,
}

/// Lifecycle status of an order with the timestamps each stage introduces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderStatus {
	/// Order has been accepted but not yet shipped.
	Created,
	/// Order has left the warehouse.
	Shipped { shipped_at: DateTime<Utc> },
	/// Order has been delivered. Terminal.
	Completed {
		shipped_at: DateTime<Utc>,
		completed_at: DateTime<Utc>,
	},
}

impl OrderStatus {
	/// Returns the data-less kind of this status.
	pub fn kind(&self) -> StatusKind {
		match self {
			OrderStatus::Created => StatusKind::Created,
			OrderStatus::Shipped { .. } => StatusKind::Shipped,
			OrderStatus::Completed { .. } => StatusKind::Completed,
		}
	}

	pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
		match self {
			OrderStatus::Created => None,
			OrderStatus::Shipped { shipped_at } | OrderStatus::Completed { shipped_at, .. } => {
				Some(*shipped_at)
			},
		}
	}

	pub fn completed_at(&self) -> Option<DateTime<Utc>> {
		match self {
			OrderStatus::Completed { completed_at, .. } => Some(*completed_at),
			_ => None,
		}
	}
}

/// Status without attached data, used for transition checks and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
	Created,
	Shipped,
	Completed,
}

impl StatusKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			StatusKind::Created => "created",
			StatusKind::Shipped => "shipped",
			StatusKind::Completed => "completed",
		}
	}
}

impl fmt::Display for StatusKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error returned when a status string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for StatusKind {
	type Err = UnknownStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"created" => Ok(Self::Created),
			"shipped" => Ok(Self::Shipped),
			"completed" => Ok(Self::Completed),
			other => Err(UnknownStatus(other.to_string())),
		}
	}
}

/// A customer order as stored under `order:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
	pub order_id: OrderId,
	pub customer_id: Uuid,
	pub line_items: Vec<LineItem>,
	pub created_at: DateTime<Utc>,
	#[serde(flatten)]
	pub status: OrderStatus,
	/// Cancellation marker. Persisted and reported, never set by the service.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
	/// Creates a freshly accepted order.
	pub fn new(
		order_id: OrderId,
		customer_id: Uuid,
		line_items: Vec<LineItem>,
		created_at: DateTime<Utc>,
	) -> Self {
		Self {
			order_id,
			customer_id,
			line_items,
			created_at,
			status: OrderStatus::Created,
			cancelled_at: None,
		}
	}
}

impl Record for Order {
	fn record_id(&self) -> u64 {
		self.order_id
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn sample_order() -> Order {
		Order::new(
			7,
			Uuid::nil(),
			vec![LineItem {
				item_id: Uuid::nil(),
				quantity: 3,
				price: 1250,
			}],
			Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
		)
	}

	#[test]
	fn test_created_order_serializes_status_tag() {
		let json = serde_json::to_value(sample_order()).unwrap();

		assert_eq!(json["order_id"], 7);
		assert_eq!(json["status"], "created");
		assert!(json.get("shipped_at").is_none());
		assert!(json.get("cancelled_at").is_none());
	}

	#[test]
	fn test_completed_order_json_shape() {
		let shipped_at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
		let completed_at = Utc.with_ymd_and_hms(2024, 5, 3, 9, 30, 0).unwrap();
		let mut order = sample_order();
		order.status = OrderStatus::Completed {
			shipped_at,
			completed_at,
		};

		let json = serde_json::to_value(&order).unwrap();
		assert_eq!(json["status"], "completed");
		assert_eq!(json["shipped_at"], "2024-05-02T08:00:00Z");
		assert_eq!(json["completed_at"], "2024-05-03T09:30:00Z");

		let decoded: Order = serde_json::from_value(json).unwrap();
		assert_eq!(decoded, order);
		assert_eq!(decoded.status.kind(), StatusKind::Completed);
		assert_eq!(decoded.status.shipped_at(), Some(shipped_at));
	}

	#[test]
	fn test_completed_without_shipped_at_is_rejected() {
		let json = serde_json::json!({
			"order_id": 1,
			"customer_id": Uuid::nil(),
			"line_items": [],
			"created_at": "2024-05-01T12:00:00Z",
			"status": "completed",
			"completed_at": "2024-05-03T09:30:00Z"
		});

		assert!(serde_json::from_value::<Order>(json).is_err());
	}

	#[test]
	fn test_status_kind_from_str() {
		assert_eq!("shipped".parse::<StatusKind>(), Ok(StatusKind::Shipped));
		assert_eq!("completed".parse::<StatusKind>(), Ok(StatusKind::Completed));
		assert_eq!(
			"cancelled".parse::<StatusKind>(),
			Err(UnknownStatus("cancelled".to_string()))
		);
	}
}
