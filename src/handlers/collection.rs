use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::CONFIG;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::payload::{resolve_payload, BulkPayload};
use crate::record::Record;
use crate::response::{ApiResponse, ApiResult};
use crate::schema::ResourceSchema;
use crate::serializer::RecordSerializer;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn resource_schema<'a>(state: &'a AppState, resource: &str) -> Result<&'a ResourceSchema, ApiError> {
    state
        .schemas
        .get(resource)
        .ok_or_else(|| ApiError::not_found(format!("Unknown resource '{}'", resource)))
}

/// Resolve the request body into the effective payload and enforce the
/// configured bulk size cap.
fn resolve_request_payload(body: Value) -> Result<BulkPayload, ApiError> {
    let payload = resolve_payload(body, CONFIG.bulk.payload_key.as_deref())?;
    if let Some(max) = CONFIG.bulk.max_records {
        if payload.len() > max {
            return Err(ApiError::bad_request(format!(
                "Bulk payload exceeds the maximum of {} records",
                max
            )));
        }
    }
    Ok(payload)
}

/// GET /api/data/:resource - List records
pub async fn get(
    Path(resource): Path<String>,
    Query(query): Query<ListQuery>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Value> {
    resource_schema(&state, &resource)?;

    // Cap client-supplied limits at the configured maximum
    let limit = match (query.limit, CONFIG.api.max_limit) {
        (Some(limit), Some(max)) if limit > max => {
            tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max);
            Some(max)
        }
        (limit, _) => limit,
    };

    let filter = FilterData { where_clause: None, limit, offset: query.offset };
    let records = state.store.list(&resource, &filter).await?;
    Ok(ApiResponse::success(Record::to_api_output_array(&records)))
}

/// POST /api/data/:resource - Create a single record or a bulk of records.
///
/// The payload shape decides the path: an object goes through the standard
/// single-object create, an array through multi-record validation and the
/// bulk-create hook. Both return 201.
pub async fn post(
    Path(resource): Path<String>,
    Extension(state): Extension<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let schema = resource_schema(&state, &resource)?;
    let serializer = RecordSerializer::new(schema);

    match resolve_request_payload(body)? {
        BulkPayload::Single(map) => {
            let record = serializer
                .validate_one(&Value::Object(map))
                .map_err(|errors| ApiError::validation_error("Validation failed", Some(errors)))?;
            let created = state.store.insert(&resource, record).await?;
            Ok(ApiResponse::created(created.to_api_output()))
        }
        BulkPayload::Many(items) => {
            // Validate every record before persisting any of them
            let records = serializer.validate_many(&items)?;
            let created =
                state.hooks.perform_bulk_create(state.store.as_ref(), &resource, records).await?;
            tracing::info!("Created {} records in '{}'", created.len(), resource);
            Ok(ApiResponse::created(Record::to_api_output_array(&created)))
        }
    }
}

/// PUT /api/data/:resource - Bulk update with full records
pub async fn put(
    Path(resource): Path<String>,
    Extension(state): Extension<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    bulk_update(resource, state, body, false).await
}

/// PATCH /api/data/:resource - Bulk update, omitted fields left unchanged
pub async fn patch(
    Path(resource): Path<String>,
    Extension(state): Extension<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    bulk_update(resource, state, body, true).await
}

async fn bulk_update(
    resource: String,
    state: AppState,
    body: Value,
    partial: bool,
) -> ApiResult<Value> {
    let schema = resource_schema(&state, &resource)?;

    let items = match resolve_request_payload(body)? {
        BulkPayload::Many(items) => items,
        BulkPayload::Single(_) => {
            return Err(ApiError::validation_error(
                "Bulk update expects an array of records",
                None,
            ))
        }
    };

    // The update's target set: the collection narrowed to the payload's ids
    let ids: Vec<Value> = items.iter().filter_map(|item| item.get("id")).cloned().collect();
    let existing = state.store.list(&resource, &FilterData::any_of("id", ids)).await?;
    let by_id: HashMap<Uuid, Record> =
        existing.into_iter().filter_map(|r| r.id().map(|id| (id, r))).collect();

    let serializer =
        if partial { RecordSerializer::partial(schema) } else { RecordSerializer::new(schema) };
    let records = serializer.validate_update_many(&items, &by_id)?;

    let updated = state.hooks.perform_bulk_update(state.store.as_ref(), &resource, records).await?;
    tracing::info!("Updated {} records in '{}'", updated.len(), resource);
    Ok(ApiResponse::success(Record::to_api_output_array(&updated)))
}

/// DELETE /api/data/:resource - Destroy every record matching the filter.
///
/// Gated by the destroy hook: with the stock hooks the filter must carry a
/// narrowing where clause, so a bare DELETE can never empty a collection.
pub async fn delete(
    Path(resource): Path<String>,
    Extension(state): Extension<AppState>,
    body: Option<Json<FilterData>>,
) -> ApiResult<()> {
    resource_schema(&state, &resource)?;
    let filter = body.map(|Json(filter)| filter).unwrap_or_default();

    if !state.hooks.allow_bulk_destroy(&filter) {
        return Err(ApiError::bad_request(
            "Bulk destroy requires a narrowing filter; refusing to delete the whole collection",
        ));
    }

    let targets = state.store.list(&resource, &filter).await?;
    let deleted =
        state.hooks.perform_bulk_destroy(state.store.as_ref(), &resource, targets).await?;
    tracing::info!("Destroyed {} records in '{}'", deleted, resource);

    Ok(ApiResponse::<()>::no_content())
}
