use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::response::{ApiResponse, ApiResult};
use crate::serializer::RecordSerializer;
use crate::state::AppState;

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::bad_request(format!("Invalid record id '{}'", raw)))
}

/// GET /api/data/:resource/:id - Fetch a single record
pub async fn get(
    Path((resource, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Value> {
    state
        .schemas
        .get(&resource)
        .ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", resource)))?;
    let id = parse_id(&id)?;

    let record = state
        .store
        .get(&resource, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Record {} not found in {}", id, resource)))?;
    Ok(ApiResponse::success(record.to_api_output()))
}

/// PUT /api/data/:resource/:id - Full update of a single record
pub async fn put(
    Path((resource, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    update_one(resource, id, state, body, false).await
}

/// PATCH /api/data/:resource/:id - Partial update of a single record
pub async fn patch(
    Path((resource, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    update_one(resource, id, state, body, true).await
}

async fn update_one(
    resource: String,
    id: String,
    state: AppState,
    body: Value,
    partial: bool,
) -> ApiResult<Value> {
    let schema = state
        .schemas
        .get(&resource)
        .ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", resource)))?;
    let id = parse_id(&id)?;

    let serializer =
        if partial { RecordSerializer::partial(schema) } else { RecordSerializer::new(schema) };
    let changes = serializer
        .validate_changes(&body)
        .map_err(|errors| ApiError::validation_error("Validation failed", Some(errors)))?;

    let mut record = state
        .store
        .get(&resource, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Record {} not found in {}", id, resource)))?;
    record.merge_changes(changes);

    let updated = state.store.update(&resource, record).await?;
    Ok(ApiResponse::success(updated.to_api_output()))
}

/// DELETE /api/data/:resource/:id - Delete a single record
pub async fn delete(
    Path((resource, id)): Path<(String, String)>,
    Extension(state): Extension<AppState>,
) -> ApiResult<()> {
    state
        .schemas
        .get(&resource)
        .ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", resource)))?;
    let id = parse_id(&id)?;

    state.store.delete(&resource, id).await?;
    Ok(ApiResponse::<()>::no_content())
}
