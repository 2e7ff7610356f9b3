use axum::{extract::State, Extension, Json};
use kidswear_core::{SearchRequest, SearchResult};
use kidswear_services::CatalogStore;

use crate::middleware::RequestId;

use super::{map_service_error, ok, ApiError, ApiResponse, AppState};

/// Filter engine query: text, filters, sort and page in; page, total,
/// facets and suggestions out.
pub(super) async fn search<S: CatalogStore>(
    State(state): State<AppState<S>>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ApiResponse<SearchResult>>, ApiError> {
    let result = state
        .services
        .catalog
        .search(&request)
        .await
        .map_err(|e| map_service_error(req_id.0.clone(), e))?;
    Ok(ok(req_id, result))
}
