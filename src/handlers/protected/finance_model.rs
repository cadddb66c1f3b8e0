// /finance-model/ - financial models owned by the caller

use axum::{
    extract::{Path, State},
    http::Uri,
    Extension,
};
use serde_json::Value;

use crate::api::{params, Page, Paginator};
use crate::database::models::{FinancialModel, FinancialModelChanges, NewFinancialModel};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::access;
use crate::state::AppState;

const NAME_MAX: usize = 255;
const VERSION_MAX: usize = 50;

/// Parse model fields; with `required` every field must be present
fn model_changes(body: &Value, required: bool) -> Result<FinancialModelChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let name = params::text(&mut errors, body, "name", NAME_MAX, required);
    let version = params::text(&mut errors, body, "version", VERSION_MAX, required);
    let model_type = params::choice(&mut errors, body, "model_type");
    let model_type = params::required(&mut errors, "model_type", model_type, required);
    errors.into_result()?;

    Ok(FinancialModelChanges {
        name,
        version,
        model_type,
    })
}

/// GET /finance-model/
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    uri: Uri,
) -> ApiResult<Page<FinancialModel>> {
    let store = state.store.as_ref();
    let owner = user.user_id;

    let mut paginator = Paginator::from_uri(&uri, state.page_size())?;
    let listing = paginator.fetch(move |page| store.list_models(owner, page)).await?;
    Ok(ApiResponse::success(paginator.finish(listing)?))
}

/// POST /finance-model/ - the caller becomes the owner
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<FinancialModel> {
    let changes = model_changes(&body, true)?;
    let model = state
        .store
        .insert_model(
            user.user_id,
            NewFinancialModel {
                name: params::take(changes.name, "name")?,
                version: params::take(changes.version, "version")?,
                model_type: params::take(changes.model_type, "model_type")?,
            },
        )
        .await?;

    tracing::info!(user_id = user.user_id, model_id = model.id, "Created financial model");
    Ok(ApiResponse::created(model))
}

/// GET /finance-model/:id/
pub async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<FinancialModel> {
    let id = params::path_id(&id)?;
    let model = access::owned_model(state.store.as_ref(), user.user_id, id).await?;
    Ok(ApiResponse::success(model))
}

async fn update(state: AppState, user: AuthUser, id: &str, body: Value, partial: bool) -> ApiResult<FinancialModel> {
    let id = params::path_id(id)?;
    access::owned_model(state.store.as_ref(), user.user_id, id).await?;

    let changes = model_changes(&body, !partial)?;
    let model = state
        .store
        .update_model(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    tracing::info!(user_id = user.user_id, model_id = id, "Updated financial model");
    Ok(ApiResponse::success(model))
}

/// PUT /finance-model/:id/
pub async fn replace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<FinancialModel> {
    update(state, user, &id, body, false).await
}

/// PATCH /finance-model/:id/
pub async fn patch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<FinancialModel> {
    update(state, user, &id, body, true).await
}

/// DELETE /finance-model/:id/ - cascades to scenarios, line items and assumptions
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = params::path_id(&id)?;
    access::owned_model(state.store.as_ref(), user.user_id, id).await?;
    state.store.delete_model(id).await?;

    tracing::info!(user_id = user.user_id, model_id = id, "Deleted financial model");
    Ok(ApiResponse::no_content())
}
