//! Core order management for the order service.
//!
//! [`OrderService`] accepts raw caller input (identifiers and cursors as
//! strings, JSON payloads as bytes), validates it, applies status
//! transitions, and persists orders through an indexed
//! [`Collection`](order_storage::Collection).

use chrono::Utc;
use order_storage::{Collection, KeyValueStore, StoreError};
use order_types::{CreateOrderRequest, ListOrdersResponse, Order, OrderId, StorageKey};
use std::sync::Arc;
use thiserror::Error;

pub mod ids;
pub mod state;

pub use ids::{IdGenerator, RandomIdGenerator, SequenceIdGenerator};
pub use state::TransitionError;

/// Number of index entries requested per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// How many fresh identifiers `create` tries before giving up on collisions.
const MAX_ID_ATTEMPTS: usize = 3;

/// Errors returned by [`OrderService`].
#[derive(Debug, Error)]
pub enum OrderServiceError {
	/// Caller input could not be parsed.
	#[error("Validation error: {0}")]
	Validation(String),
	/// No order exists with the given identifier.
	#[error("Order not found: {0}")]
	NotFound(OrderId),
	/// The requested status change is not allowed.
	#[error(transparent)]
	Transition(#[from] TransitionError),
	/// The store failed or returned unreadable data.
	#[error("Storage error: {0}")]
	Storage(#[from] StoreError),
}

/// Maps a store `NotFound` for `id` onto the service's own not-found error.
fn for_order(id: OrderId) -> impl FnOnce(StoreError) -> OrderServiceError {
	move |err| match err {
		StoreError::NotFound(_) => OrderServiceError::NotFound(id),
		other => OrderServiceError::Storage(other),
	}
}

/// Parses a string of ASCII digits. Signs and surrounding whitespace are
/// rejected.
fn parse_digits(raw: &str) -> Option<u64> {
	if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	raw.parse().ok()
}

/// Parses a decimal order identifier.
pub fn parse_order_id(raw: &str) -> Result<OrderId, OrderServiceError> {
	parse_digits(raw).ok_or_else(|| {
		OrderServiceError::Validation(format!("Order ID must be an unsigned integer: {}", raw))
	})
}

/// Parses a listing cursor; an absent or empty cursor starts from the
/// beginning.
pub fn parse_cursor(raw: Option<&str>) -> Result<u64, OrderServiceError> {
	match raw {
		None | Some("") => Ok(0),
		Some(value) => parse_digits(value).ok_or_else(|| {
			OrderServiceError::Validation(format!("Cursor must be an unsigned integer: {}", value))
		}),
	}
}

/// Order operations over a shared key-value store.
#[derive(Clone)]
pub struct OrderService {
	orders: Collection<Order>,
	ids: Arc<dyn IdGenerator>,
	page_size: usize,
}

impl OrderService {
	/// Creates a service using random identifiers.
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		Self::with_id_generator(store, Arc::new(RandomIdGenerator))
	}

	pub fn with_id_generator(store: Arc<dyn KeyValueStore>, ids: Arc<dyn IdGenerator>) -> Self {
		Self {
			orders: Collection::new(store, StorageKey::Orders),
			ids,
			page_size: DEFAULT_PAGE_SIZE,
		}
	}

	/// Creates an order from a raw JSON payload.
	pub async fn create_from_slice(&self, payload: &[u8]) -> Result<Order, OrderServiceError> {
		let request: CreateOrderRequest = serde_json::from_slice(payload)
			.map_err(|e| OrderServiceError::Validation(format!("Malformed order payload: {}", e)))?;
		self.create(request).await
	}

	/// Creates and stores a new order.
	///
	/// A generated identifier that is already taken is replaced by a fresh
	/// one, up to a small number of attempts.
	pub async fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderServiceError> {
		let created_at = Utc::now();
		let mut last_err = None;

		for _ in 0..MAX_ID_ATTEMPTS {
			let order = Order::new(
				self.ids.next_id(),
				request.customer_id,
				request.line_items.clone(),
				created_at,
			);

			match self.orders.insert(&order).await {
				Ok(()) => {
					tracing::info!(order_id = order.order_id, customer_id = %order.customer_id, "Created order");
					return Ok(order);
				},
				Err(StoreError::AlreadyExists(key)) => {
					tracing::warn!(key = %key, "Generated order ID already in use, retrying");
					last_err = Some(StoreError::AlreadyExists(key));
				},
				Err(e) => return Err(e.into()),
			}
		}

		Err(last_err
			.unwrap_or_else(|| StoreError::backend("INSERT", "", "no identifier attempts made"))
			.into())
	}

	/// Lists one page of orders starting at the caller-supplied cursor.
	pub async fn list(&self, cursor: Option<&str>) -> Result<ListOrdersResponse, OrderServiceError> {
		let cursor = parse_cursor(cursor)?;
		let page = self.orders.find_all(self.page_size, cursor).await?;

		Ok(ListOrdersResponse {
			next: (!page.is_exhausted()).then_some(page.cursor),
			items: page.items,
		})
	}

	pub async fn get_by_id(&self, raw_id: &str) -> Result<Order, OrderServiceError> {
		let id = parse_order_id(raw_id)?;
		self.orders.find_by_id(id).await.map_err(for_order(id))
	}

	/// Moves an order to the requested status (`shipped` or `completed`).
	pub async fn update_status(
		&self,
		raw_id: &str,
		status: &str,
	) -> Result<Order, OrderServiceError> {
		let id = parse_order_id(raw_id)?;
		let mut order = self.orders.find_by_id(id).await.map_err(for_order(id))?;

		let requested = state::parse_requested(status)?;
		order.status = state::transition(&order.status, requested, Utc::now())?;

		self.orders.update(&order).await.map_err(for_order(id))?;
		tracing::info!(order_id = id, status = %requested, "Updated order status");

		Ok(order)
	}

	pub async fn delete_by_id(&self, raw_id: &str) -> Result<(), OrderServiceError> {
		let id = parse_order_id(raw_id)?;
		self.orders.delete_by_id(id).await.map_err(for_order(id))?;
		tracing::info!(order_id = id, "Deleted order");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_storage::implementations::memory::MemoryStore;
	use order_types::{LineItem, StatusKind};
	use uuid::Uuid;

	fn service() -> OrderService {
		OrderService::with_id_generator(
			Arc::new(MemoryStore::new()),
			Arc::new(SequenceIdGenerator::starting_at(1)),
		)
	}

	fn request(customer_id: Uuid) -> CreateOrderRequest {
		CreateOrderRequest {
			customer_id,
			line_items: vec![LineItem {
				item_id: Uuid::new_v4(),
				quantity: 2,
				price: 999,
			}],
		}
	}

	/// Always returns the same identifier.
	struct FixedIdGenerator(OrderId);

	impl IdGenerator for FixedIdGenerator {
		fn next_id(&self) -> OrderId {
			self.0
		}
	}

	#[tokio::test]
	async fn test_create_stamps_created_at() {
		let service = service();
		let before = Utc::now();

		let order = service.create(request(Uuid::new_v4())).await.unwrap();

		assert_eq!(order.order_id, 1);
		assert!(order.created_at >= before);
		assert_eq!(order.status.kind(), StatusKind::Created);
		assert_eq!(service.get_by_id("1").await.unwrap(), order);
	}

	#[tokio::test]
	async fn test_create_from_malformed_payload() {
		let result = service().create_from_slice(b"{\"customer_id\": 12}").await;
		assert!(matches!(result, Err(OrderServiceError::Validation(_))));
	}

	#[tokio::test]
	async fn test_create_retries_taken_id() {
		let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
		let taken = OrderService::with_id_generator(store.clone(), Arc::new(FixedIdGenerator(5)));
		taken.create(request(Uuid::nil())).await.unwrap();

		let result = taken.create(request(Uuid::nil())).await;
		assert!(matches!(
			result,
			Err(OrderServiceError::Storage(StoreError::AlreadyExists(_)))
		));

		let fresh = OrderService::with_id_generator(
			store,
			Arc::new(SequenceIdGenerator::starting_at(5)),
		);
		let order = fresh.create(request(Uuid::nil())).await.unwrap();
		assert_eq!(order.order_id, 6);
	}

	#[tokio::test]
	async fn test_list_get_delete_scenario() {
		let service = service();
		let c1 = Uuid::new_v4();
		let c2 = Uuid::new_v4();

		let mut created = Vec::new();
		for customer in [c1, c1, c2] {
			created.push(service.create(request(customer)).await.unwrap());
		}

		let listing = service.list(None).await.unwrap();
		assert_eq!(listing.items.len(), 3);
		assert_eq!(listing.next, None);
		for order in &created {
			assert!(listing.items.contains(order));
			let fetched = service.get_by_id(&order.order_id.to_string()).await.unwrap();
			assert_eq!(&fetched, order);
		}

		service
			.delete_by_id(&created[1].order_id.to_string())
			.await
			.unwrap();

		let listing = service.list(Some("0")).await.unwrap();
		assert_eq!(listing.items.len(), 2);
		assert!(!listing.items.contains(&created[1]));
	}

	#[tokio::test]
	async fn test_list_empty() {
		let listing = service().list(Some("")).await.unwrap();
		assert!(listing.items.is_empty());
		assert_eq!(listing.next, None);
	}

	#[tokio::test]
	async fn test_list_rejects_malformed_cursor() {
		let result = service().list(Some("-3")).await;
		assert!(matches!(result, Err(OrderServiceError::Validation(_))));
	}

	#[tokio::test]
	async fn test_status_lifecycle() {
		let service = service();
		let order = service.create(request(Uuid::new_v4())).await.unwrap();
		let id = order.order_id.to_string();

		let shipped = service.update_status(&id, "shipped").await.unwrap();
		let shipped_at = shipped.status.shipped_at().expect("shipped_at set");
		assert!(shipped_at >= order.created_at);

		let completed = service.update_status(&id, "completed").await.unwrap();
		assert_eq!(completed.status.shipped_at(), Some(shipped_at));
		assert!(completed.status.completed_at().is_some());
		assert_eq!(service.get_by_id(&id).await.unwrap(), completed);

		for status in ["shipped", "completed", "created", "cancelled"] {
			let result = service.update_status(&id, status).await;
			assert!(result.is_err(), "status {} should be rejected", status);
		}
	}

	#[tokio::test]
	async fn test_ship_twice_rejected() {
		let service = service();
		let order = service.create(request(Uuid::new_v4())).await.unwrap();
		let id = order.order_id.to_string();

		service.update_status(&id, "shipped").await.unwrap();
		let result = service.update_status(&id, "shipped").await;

		assert!(matches!(
			result,
			Err(OrderServiceError::Transition(TransitionError::InvalidTransition {
				from: StatusKind::Shipped,
				to: StatusKind::Shipped,
			}))
		));
	}

	#[tokio::test]
	async fn test_complete_before_ship_rejected() {
		let service = service();
		let order = service.create(request(Uuid::new_v4())).await.unwrap();
		let id = order.order_id.to_string();

		let result = service.update_status(&id, "completed").await;

		assert!(matches!(result, Err(OrderServiceError::Transition(_))));
		assert_eq!(service.get_by_id(&id).await.unwrap(), order);
	}

	#[tokio::test]
	async fn test_unknown_status_rejected() {
		let service = service();
		let order = service.create(request(Uuid::new_v4())).await.unwrap();

		let result = service
			.update_status(&order.order_id.to_string(), "lost")
			.await;
		assert!(matches!(
			result,
			Err(OrderServiceError::Transition(TransitionError::UnknownStatus(s))) if s == "lost"
		));
	}

	#[tokio::test]
	async fn test_missing_order_maps_to_not_found() {
		let service = service();

		assert!(matches!(
			service.get_by_id("404").await,
			Err(OrderServiceError::NotFound(404))
		));
		assert!(matches!(
			service.update_status("404", "shipped").await,
			Err(OrderServiceError::NotFound(404))
		));
		assert!(matches!(
			service.update_status("404", "lost").await,
			Err(OrderServiceError::NotFound(404))
		));
		assert!(matches!(
			service.delete_by_id("404").await,
			Err(OrderServiceError::NotFound(404))
		));
	}

	#[tokio::test]
	async fn test_non_numeric_id_rejected() {
		let service = service();
		for raw in ["abc", "-1", "1.5", "", "+5", " 7 ", "7\n", "18446744073709551616"] {
			assert!(matches!(
				service.get_by_id(raw).await,
				Err(OrderServiceError::Validation(_))
			));
		}
	}

	#[test]
	fn test_parse_cursor() {
		assert_eq!(parse_cursor(None).unwrap(), 0);
		assert_eq!(parse_cursor(Some("")).unwrap(), 0);
		assert_eq!(parse_cursor(Some("12")).unwrap(), 12);
		assert!(parse_cursor(Some("twelve")).is_err());
		assert!(parse_cursor(Some("+3")).is_err());
		assert!(parse_cursor(Some(" 3")).is_err());
		assert!(parse_cursor(Some(" ")).is_err());
	}
}
