use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bulletin_service_cli::{
    catalog::{paginate, GazetteFilter, DEFAULT_PAGE_SIZE},
    ServiceError,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(err: &ServiceError) -> ApiError {
    let status = match err {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::QueryTooShort { .. } => StatusCode::BAD_REQUEST,
        ServiceError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "message": err.to_string() })))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub gazette: GazetteFilter,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// GET /api/bulletins
pub async fn list_bulletins(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let filtered = state.catalog.filter(query.gazette);
    let view = paginate(
        &filtered,
        query.page.unwrap_or(1),
        query.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
    );
    (StatusCode::OK, Json(json!(view)))
}

/// GET /api/bulletins/{number}
pub async fn get_bulletin(
    Extension(state): Extension<AppState>,
    Path(number): Path<usize>,
) -> Result<impl IntoResponse, ApiError> {
    let bulletin = state.catalog.get(number).map_err(|e| api_error(&e))?;
    Ok((StatusCode::OK, Json(json!(bulletin))))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /api/search?q=
pub async fn search_bulletins(
    Extension(state): Extension<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let found = state.catalog.search(&query.q).map_err(|e| api_error(&e))?;
    Ok((
        StatusCode::OK,
        Json(json!({ "count": found.len(), "results": found })),
    ))
}
