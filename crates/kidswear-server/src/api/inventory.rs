use axum::{
    extract::{Query, State},
    Extension, Json,
};
use kidswear_core::{
    Availability, InventoryAlert, InventoryRecord, RestockEntry, StockLine, StockMovement,
    VariantKey,
};
use kidswear_services::CatalogStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_service_error, normalize_limit, ok, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct AvailabilityRequest {
    #[serde(flatten)]
    pub key: VariantKey,
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub(super) struct AvailabilityItem {
    #[serde(flatten)]
    key: VariantKey,
    requested: i32,
    #[serde(flatten)]
    availability: Availability,
}

#[derive(Debug, Deserialize)]
pub(super) struct StockLinesRequest {
    pub items: Vec<StockLine>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RestockRequest {
    pub items: Vec<RestockEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProvisionRequest {
    #[serde(flatten)]
    pub key: VariantKey,
    pub stock_quantity: i32,
    #[serde(default)]
    pub low_stock_threshold: Option<i32>,
    #[serde(default)]
    pub cost_per_unit: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StockUpdateRequest {
    #[serde(flatten)]
    pub key: VariantKey,
    pub quantity: i32,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Query strings cannot carry a flattened key, so the fields are spelled out.
#[derive(Debug, Deserialize)]
pub(super) struct MovementQuery {
    pub product_id: Uuid,
    pub size: String,
    #[serde(default)]
    pub color_index: i32,
    pub limit: Option<i64>,
}

pub(super) async fn check_availability<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<AvailabilityRequest>,
) -> Result<Json<ApiResponse<AvailabilityItem>>, ApiError> {
    let availability = state
        .services
        .ledger
        .check_availability(&body.key, body.quantity)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(
        req_id,
        AvailabilityItem {
            key: body.key,
            requested: body.quantity,
            availability,
        },
    ))
}

pub(super) async fn reserve<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StockLinesRequest>,
) -> Result<Json<ApiResponse<Vec<InventoryRecord>>>, ApiError> {
    let records = state
        .services
        .ledger
        .reserve_stock(&body.items)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, records))
}

pub(super) async fn release<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StockLinesRequest>,
) -> Result<Json<ApiResponse<Vec<InventoryRecord>>>, ApiError> {
    let records = state
        .services
        .ledger
        .release_reserved_stock(&body.items)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, records))
}

pub(super) async fn restock<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<RestockRequest>,
) -> Result<Json<ApiResponse<Vec<InventoryRecord>>>, ApiError> {
    let records = state
        .services
        .ledger
        .restock_items(&body.items)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, records))
}

pub(super) async fn provision<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ProvisionRequest>,
) -> Result<Json<ApiResponse<InventoryRecord>>, ApiError> {
    let record = state
        .services
        .ledger
        .provision(
            body.key,
            body.stock_quantity,
            body.low_stock_threshold,
            body.cost_per_unit,
        )
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, record))
}

pub(super) async fn update_stock<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StockUpdateRequest>,
) -> Result<Json<ApiResponse<InventoryRecord>>, ApiError> {
    let record = state
        .services
        .ledger
        .update_stock(&body.key, body.quantity, body.reason.as_deref())
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, record))
}

pub(super) async fn alerts<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<InventoryAlert>>>, ApiError> {
    let alerts = state
        .services
        .ledger
        .get_inventory_alerts()
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, alerts))
}

pub(super) async fn movements<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<MovementQuery>,
) -> Result<Json<ApiResponse<Vec<StockMovement>>>, ApiError> {
    let key = VariantKey::new(query.product_id, query.size, query.color_index);
    let movements = state
        .services
        .ledger
        .movements(&key, normalize_limit(query.limit))
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, movements))
}
