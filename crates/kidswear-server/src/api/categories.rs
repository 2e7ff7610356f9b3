use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use kidswear_core::{BasicCategory, CategoryDefinition, CategoryKind, CategoryValidation, Product};
use kidswear_services::CatalogStore;
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_service_error, ok, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CategoryQuery {
    pub kind: Option<CategoryKind>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AssignmentRequest {
    pub category: BasicCategory,
    #[serde(default)]
    pub smart_categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ValidateQuery {
    /// Reject with `configuration_invalid` instead of reporting errors inline.
    #[serde(default)]
    pub strict: bool,
}

pub(super) async fn list_categories<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CategoryQuery>,
) -> Json<ApiResponse<Vec<CategoryDefinition>>> {
    let data = state
        .services
        .catalog
        .registry()
        .all()
        .iter()
        .filter(|c| query.kind.is_none_or(|kind| c.kind == kind))
        .cloned()
        .collect();
    ok(req_id, data)
}

pub(super) async fn get_category<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<CategoryDefinition>>, ApiError> {
    match state.services.catalog.registry().get(&slug) {
        Some(category) => Ok(ok(req_id, category.clone())),
        None => Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("category '{slug}' not found"),
        )),
    }
}

pub(super) async fn list_category_products<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ApiError> {
    if state.services.catalog.registry().get(&slug).is_none() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("category '{slug}' not found"),
        ));
    }
    let products = state
        .services
        .catalog
        .products_in(&slug)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, products))
}

pub(super) async fn product_categories<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<CategoryDefinition>>>, ApiError> {
    let categories = state
        .services
        .catalog
        .categories_for(id)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, categories))
}

pub(super) async fn validate_assignment<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ValidateQuery>,
    Json(body): Json<AssignmentRequest>,
) -> Result<Json<ApiResponse<CategoryValidation>>, ApiError> {
    let catalog = &state.services.catalog;
    let validation = if query.strict {
        catalog
            .require_valid_assignment(body.category, &body.smart_categories, &body.tags)
            .map_err(|e| map_service_error(req_id.0.clone(), e))?
    } else {
        catalog.validate_assignment(body.category, &body.smart_categories, &body.tags)
    };
    Ok(ok(req_id, validation))
}
