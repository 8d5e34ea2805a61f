//! Order API implementation.
//!
//! Bridges the HTTP handlers and [`OrderService`]: decodes request bodies,
//! invokes the service and translates its errors into [`APIError`]s with
//! the matching status code.

use order_core::{OrderService, OrderServiceError};
use order_types::{APIError, ListOrdersQuery, ListOrdersResponse, Order, UpdateOrderRequest};
use tracing::{error, warn};

/// Converts a service error into an API error, logging it at a level that
/// reflects who is at fault.
pub fn api_error(err: OrderServiceError) -> APIError {
	match err {
		OrderServiceError::Validation(message) => {
			warn!("Rejected request: {}", message);
			APIError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message,
				details: None,
			}
		},
		OrderServiceError::Transition(e) => {
			warn!("Rejected status change: {}", e);
			APIError::BadRequest {
				error_type: "INVALID_TRANSITION".to_string(),
				message: e.to_string(),
				details: None,
			}
		},
		OrderServiceError::NotFound(id) => APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".to_string(),
			message: format!("Order {} not found", id),
		},
		OrderServiceError::Storage(e) => {
			error!("Storage failure: {}", e);
			APIError::InternalServerError {
				error_type: "STORAGE_ERROR".to_string(),
				message: "The order store is unavailable".to_string(),
			}
		},
	}
}

pub async fn create_order(orders: &OrderService, body: &[u8]) -> Result<Order, APIError> {
	orders.create_from_slice(body).await.map_err(api_error)
}

pub async fn list_orders(
	orders: &OrderService,
	query: ListOrdersQuery,
) -> Result<ListOrdersResponse, APIError> {
	orders
		.list(query.cursor.as_deref())
		.await
		.map_err(api_error)
}

pub async fn get_order(orders: &OrderService, id: &str) -> Result<Order, APIError> {
	orders.get_by_id(id).await.map_err(api_error)
}

pub async fn update_order(
	orders: &OrderService,
	id: &str,
	body: &[u8],
) -> Result<Order, APIError> {
	let request: UpdateOrderRequest = serde_json::from_slice(body).map_err(|e| {
		api_error(OrderServiceError::Validation(format!(
			"Malformed update payload: {}",
			e
		)))
	})?;

	orders
		.update_status(id, &request.status)
		.await
		.map_err(api_error)
}

pub async fn delete_order(orders: &OrderService, id: &str) -> Result<(), APIError> {
	orders.delete_by_id(id).await.map_err(api_error)
}

#[cfg(test)]
mod tests {
	use super::*;
	use order_core::TransitionError;
	use order_storage::StoreError;
	use order_types::StatusKind;

	#[test]
	fn test_error_status_mapping() {
		let cases = [
			(OrderServiceError::Validation("bad id".into()), 400),
			(
				OrderServiceError::Transition(TransitionError::InvalidTransition {
					from: StatusKind::Created,
					to: StatusKind::Completed,
				}),
				400,
			),
			(OrderServiceError::NotFound(3), 404),
			(
				OrderServiceError::Storage(StoreError::backend("GET", "order:3", "timeout")),
				500,
			),
			(
				OrderServiceError::Storage(StoreError::Decode {
					key: "order:3".into(),
					message: "expected value".into(),
				}),
				500,
			),
		];

		for (err, status) in cases {
			assert_eq!(api_error(err).status_code(), status);
		}
	}

	#[test]
	fn test_storage_details_are_not_leaked() {
		let err = api_error(OrderServiceError::Storage(StoreError::backend(
			"GET",
			"order:3",
			"redis://secret-host refused",
		)));
		let body = err.to_error_response();
		assert_eq!(body.error, "STORAGE_ERROR");
		assert!(!body.message.contains("secret-host"));
	}
}
