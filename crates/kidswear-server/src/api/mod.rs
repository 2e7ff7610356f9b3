mod categories;
mod inventory;
mod orders;
mod search;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use kidswear_services::{CatalogStore, ServiceError, Services};
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

pub struct AppState<S> {
    pub services: Services<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

pub(super) fn ok<T: Serialize>(req_id: RequestId, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Option<serde_json::Value>) -> Self {
        self.error.details = details;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "capacity_conflict" | "conflict" => StatusCode::CONFLICT,
            "configuration_invalid" => StatusCode::UNPROCESSABLE_ENTITY,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_service_error(request_id: String, error: ServiceError) -> ApiError {
    let message = error.to_string();
    match error {
        ServiceError::NotFound(_) => ApiError::new(request_id, "not_found", message),
        ServiceError::Validation(_) => ApiError::new(request_id, "validation_error", message),
        ServiceError::CapacityConflict(shortfalls) => {
            ApiError::new(request_id, "capacity_conflict", message)
                .with_details(serde_json::to_value(&shortfalls).ok())
        }
        ServiceError::ConfigurationInvalid(errors) => {
            ApiError::new(request_id, "configuration_invalid", message)
                .with_details(serde_json::to_value(&errors).ok())
        }
        ServiceError::Unavailable(reason) => {
            tracing::warn!(reason = %reason, "store unavailable");
            ApiError::new(request_id, "upstream_unavailable", "store unavailable")
        }
        ServiceError::Internal(reason) => {
            tracing::error!(reason = %reason, "store operation failed");
            ApiError::new(request_id, "internal_error", "store operation failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router<S: CatalogStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/v1/categories", get(categories::list_categories::<S>))
        .route(
            "/api/v1/categories/validate",
            post(categories::validate_assignment::<S>),
        )
        .route("/api/v1/categories/{slug}", get(categories::get_category::<S>))
        .route(
            "/api/v1/categories/{slug}/products",
            get(categories::list_category_products::<S>),
        )
        .route(
            "/api/v1/products/{id}/categories",
            get(categories::product_categories::<S>),
        )
        .route("/api/v1/search", post(search::search::<S>))
        .route(
            "/api/v1/inventory/availability",
            post(inventory::check_availability::<S>),
        )
        .route("/api/v1/orders", post(orders::create_order::<S>))
        .route("/api/v1/orders/{id}", get(orders::get_order::<S>))
        .route(
            "/api/v1/orders/by-number/{order_number}",
            get(orders::track_order::<S>),
        )
}

fn admin_router<S: CatalogStore>(auth: AuthState) -> Router<AppState<S>> {
    Router::new()
        .route("/api/v1/inventory/reserve", post(inventory::reserve::<S>))
        .route("/api/v1/inventory/release", post(inventory::release::<S>))
        .route("/api/v1/inventory/restock", post(inventory::restock::<S>))
        .route(
            "/api/v1/inventory/provision",
            post(inventory::provision::<S>),
        )
        .route("/api/v1/inventory/stock", put(inventory::update_stock::<S>))
        .route("/api/v1/inventory/alerts", get(inventory::alerts::<S>))
        .route(
            "/api/v1/inventory/movements",
            get(inventory::movements::<S>),
        )
        .route("/api/v1/admin/orders", get(orders::list_orders::<S>))
        .route(
            "/api/v1/admin/orders/by-number/{order_number}",
            get(orders::get_order_by_number::<S>),
        )
        .route(
            "/api/v1/orders/{id}/status",
            patch(orders::update_status::<S>),
        )
        .route(
            "/api/v1/orders/{id}/payment",
            patch(orders::update_payment::<S>),
        )
        .route("/api/v1/orders/{id}/cancel", post(orders::cancel::<S>))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                )),
        )
}

pub fn build_app<S: CatalogStore>(
    state: AppState<S>,
    auth: AuthState,
    rate_limit: RateLimitState,
) -> Router {
    let limited: Router<AppState<S>> = Router::new()
        .merge(public_router::<S>())
        .merge(admin_router::<S>(auth))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ));

    Router::new()
        .route("/api/v1/health", get(health::<S>))
        .merge(limited)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(CompressionLayer::new())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match state.services.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
