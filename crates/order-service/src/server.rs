//! HTTP server for the order API.
//!
//! Routes `/orders` requests to the order service and owns the server
//! lifecycle: once the shutdown token is cancelled the listener stops
//! accepting connections and in-flight requests get a bounded grace period
//! before they are aborted.

use axum::{
	body::Bytes,
	extract::{DefaultBodyLimit, Path, Query, State},
	http::StatusCode,
	response::Json,
	routing::{get, post},
	Router,
};
use order_config::ApiConfig;
use order_core::OrderService;
use order_types::{APIError, ListOrdersQuery, ListOrdersResponse, Order};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Order operations backed by the shared store client.
	pub orders: OrderService,
}

/// Builds the API router with its middleware stack.
pub fn build_router(orders: OrderService, api_config: &ApiConfig) -> Router {
	Router::new()
		.route("/orders", post(handle_create_order).get(handle_list_orders))
		.route(
			"/orders/{id}",
			get(handle_get_order)
				.put(handle_update_order)
				.delete(handle_delete_order),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(AppState { orders })
}

/// Starts the HTTP server and runs it until `shutdown` is cancelled.
pub async fn start_server(
	api_config: ApiConfig,
	orders: OrderService,
	shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	let app = build_router(orders, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order API server starting on {}", bind_address);

	let stop_accepting = shutdown.clone();
	let mut server = tokio::spawn(async move {
		axum::serve(listener, app)
			.with_graceful_shutdown(async move { stop_accepting.cancelled().await })
			.await
	});

	tokio::select! {
		result = &mut server => {
			// Server ended without a shutdown request
			result??;
			return Ok(());
		}
		_ = shutdown.cancelled() => {}
	}

	let grace = Duration::from_secs(api_config.shutdown_grace_seconds);
	tracing::info!("Draining in-flight requests for up to {}s", grace.as_secs());

	match tokio::time::timeout(grace, &mut server).await {
		Ok(result) => result??,
		Err(_) => {
			tracing::warn!(
				"In-flight requests still running after {}s, aborting",
				grace.as_secs()
			);
			server.abort();
		},
	}

	tracing::info!("Order API server stopped");
	Ok(())
}

/// Handles POST /orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let order = crate::apis::order::create_order(&state.orders, &body).await?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /orders requests.
async fn handle_list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ListOrdersResponse>, APIError> {
	crate::apis::order::list_orders(&state.orders, query)
		.await
		.map(Json)
}

/// Handles GET /orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, APIError> {
	crate::apis::order::get_order(&state.orders, &id)
		.await
		.map(Json)
}

/// Handles PUT /orders/{id} requests.
async fn handle_update_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<Order>, APIError> {
	crate::apis::order::update_order(&state.orders, &id, &body)
		.await
		.map(Json)
}

/// Handles DELETE /orders/{id} requests.
async fn handle_delete_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<StatusCode, APIError> {
	crate::apis::order::delete_order(&state.orders, &id).await?;
	Ok(StatusCode::NO_CONTENT)
}
