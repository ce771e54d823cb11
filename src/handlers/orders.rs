//! # Orders API Handlers
//!
//! Customer order placement plus the owner/staff order views and status updates.

use axum::{
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::orders::{CreateOrderRequest, OrderListQuery, OrderView};
use crate::server::AppState;

/// Body of a status update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    /// Target status: NEW, PREPARING, READY, COMPLETED or CANCELLED
    #[schema(example = "PREPARING")]
    pub status: String,
}

/// Place an order from a table
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderView, headers(
            ("Location", description = "URL of the created order")
        )),
        (status = 400, description = "Invalid cart or missing fields", body = ApiError),
        (status = 404, description = "Unknown restaurant or table", body = ApiError),
        (status = 503, description = "Order number could not be allocated; retry", body = ApiError)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<OrderView>), ApiError> {
    let Json(request) = payload?;
    let order = state.orders.create_order(request).await?;

    let location = format!("/api/v1/orders/{}", order.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(order),
    ))
}

/// List the caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    security(("bearer_auth" = [])),
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders", body = [OrderView]),
        (status = 400, description = "Invalid filter", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Role may not read orders", body = ApiError)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
    query: Result<Query<OrderListQuery>, QueryRejection>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let Query(query) = query?;
    let orders = state.orders.list_orders(&principal, query).await?;
    Ok(Json(orders))
}

/// Fetch one order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = OrderView),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 404, description = "No such order for this restaurant", body = ApiError)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderView>, ApiError> {
    let order = state.orders.get_order(&principal, order_id).await?;
    Ok(Json(order))
}

/// Move an order to its next status
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Updated order", body = OrderView),
        (status = 400, description = "Unknown status or transition not allowed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Role may not change orders", body = ApiError),
        (status = 404, description = "No such order for this restaurant", body = ApiError),
        (status = 409, description = "Order changed concurrently", body = ApiError)
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let Json(request) = payload?;
    let order = state
        .lifecycle
        .transition(&principal, order_id, &request.status)
        .await?;
    Ok(Json(order))
}
