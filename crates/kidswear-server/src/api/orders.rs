use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use kidswear_core::{NewOrder, Order, OrderStatus, PaymentStatus};
use kidswear_services::{CatalogStore, StatusUpdate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_service_error, normalize_limit, ok, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct PlacementItem {
    order: Order,
    /// An earlier checkout with the same idempotency key created this order.
    replayed: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TrackQuery {
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PaymentUpdate {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub(super) struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub(super) async fn create_order<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<NewOrder>,
) -> Result<(StatusCode, Json<ApiResponse<PlacementItem>>), ApiError> {
    let placement = state
        .services
        .orders
        .create_order(body)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    let status = if placement.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        ok(
            req_id,
            PlacementItem {
                order: placement.order,
                replayed: placement.replayed,
            },
        ),
    ))
}

pub(super) async fn get_order<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, order))
}

pub(super) async fn get_order_by_number<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .services
        .orders
        .get_order_by_number(&order_number)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, order))
}

pub(super) async fn track_order<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(order_number): Path<String>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let Some(phone) = query.phone.filter(|p| !p.trim().is_empty()) else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            "phone query parameter is required",
        ));
    };
    let order = state
        .services
        .orders
        .track_order(&order_number, &phone)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, order))
}

pub(super) async fn list_orders<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(
            query.status,
            normalize_limit(query.limit),
            query.offset.unwrap_or(0),
        )
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, orders))
}

pub(super) async fn update_status<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .services
        .orders
        .update_order_status(id, body)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, order))
}

pub(super) async fn update_payment<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<PaymentUpdate>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .services
        .orders
        .update_payment_status(id, body.payment_status)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, order))
}

pub(super) async fn cancel<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError> {
    let order = state
        .services
        .orders
        .cancel_order(id, body.reason.as_deref())
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, order))
}
