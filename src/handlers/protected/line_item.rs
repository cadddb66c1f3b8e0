// /line-item/ - amounts per model, scenario and period

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    Extension,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::format::LineItemView;
use crate::api::{params, Expander, Page, Paginator};
use crate::database::models::{LineItem, LineItemChanges, LineItemFilter, NewLineItem};
use crate::database::Store;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::access;
use crate::state::AppState;

const NAME_MAX: usize = 255;
const AMOUNT_DIGITS: u32 = 15;
const AMOUNT_PLACES: u32 = 2;

fn line_item_changes(body: &Value, required: bool) -> Result<LineItemChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let model_id = params::pk(&mut errors, body, "model_id");
    let scenario_id = params::pk(&mut errors, body, "scenario_id");
    let period_id = params::pk(&mut errors, body, "period_id");
    let name = params::text(&mut errors, body, "name", NAME_MAX, required);
    let category = params::choice(&mut errors, body, "category");
    let amount = params::decimal(&mut errors, body, "amount", AMOUNT_DIGITS, AMOUNT_PLACES);

    let changes = LineItemChanges {
        model_id: params::required(&mut errors, "model_id", model_id, required),
        scenario_id: params::required(&mut errors, "scenario_id", scenario_id, required),
        period_id: params::required(&mut errors, "period_id", period_id, required),
        name,
        category: params::required(&mut errors, "category", category, required),
        amount: params::required(&mut errors, "amount", amount, required),
    };
    errors.into_result()?;
    Ok(changes)
}

/// Check the references a line item would end up with after applying `changes`
/// on top of `existing` (or on nothing, for a create)
async fn check_references(
    store: &dyn Store,
    user_id: i64,
    existing: Option<&LineItem>,
    changes: &LineItemChanges,
) -> Result<(), ApiError> {
    let model_id = changes.model_id.or(existing.map(|i| i.model_id));
    let scenario_id = changes.scenario_id.or(existing.map(|i| i.scenario_id));

    if let Some(model_id) = changes.model_id {
        access::referenced_model(store, user_id, model_id).await?;
    }
    if changes.model_id.is_some() || changes.scenario_id.is_some() {
        if let (Some(model_id), Some(scenario_id)) = (model_id, scenario_id) {
            access::referenced_scenario(store, model_id, scenario_id).await?;
        }
    }
    if let Some(period_id) = changes.period_id {
        access::referenced_period(store, period_id).await?;
    }
    Ok(())
}

/// GET /line-item/?model_id=&scenario_id=&period_id=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
) -> ApiResult<Page<LineItemView>> {
    let mut errors = FieldErrors::new();
    let filter = LineItemFilter {
        model_id: params::query_id(&mut errors, &query, "model_id"),
        scenario_id: params::query_id(&mut errors, &query, "scenario_id"),
        period_id: params::query_id(&mut errors, &query, "period_id"),
    };
    errors.into_result()?;

    let store = state.store.as_ref();
    let owner = user.user_id;
    let filter = &filter;

    let mut paginator = Paginator::from_uri(&uri, state.page_size())?;
    let listing = paginator
        .fetch(move |page| store.list_line_items(owner, filter, page))
        .await?;

    let mut page = paginator.finish(listing)?;
    let rows = std::mem::take(&mut page.results);
    let views = Expander::new(store).line_item_views(rows).await?;
    Ok(ApiResponse::success(page.with_results(views)))
}

/// POST /line-item/
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<LineItemView> {
    let store = state.store.as_ref();
    let changes = line_item_changes(&body, true)?;
    check_references(store, user.user_id, None, &changes).await?;

    let item = store
        .insert_line_item(NewLineItem {
            model_id: params::take(changes.model_id, "model_id")?,
            scenario_id: params::take(changes.scenario_id, "scenario_id")?,
            period_id: params::take(changes.period_id, "period_id")?,
            name: params::take(changes.name, "name")?,
            category: params::take(changes.category, "category")?,
            amount: params::take(changes.amount, "amount")?,
        })
        .await?;

    tracing::info!(user_id = user.user_id, line_item_id = item.id, "Created line item");
    let view = Expander::new(store).line_item_view(item).await?;
    Ok(ApiResponse::created(view))
}

/// GET /line-item/:id/
pub async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<LineItemView> {
    let id = params::path_id(&id)?;
    let item = access::owned_line_item(state.store.as_ref(), user.user_id, id).await?;
    let view = Expander::new(state.store.as_ref()).line_item_view(item).await?;
    Ok(ApiResponse::success(view))
}

async fn update(state: AppState, user: AuthUser, id: &str, body: Value, partial: bool) -> ApiResult<LineItemView> {
    let id = params::path_id(id)?;
    let store = state.store.as_ref();
    let existing = access::owned_line_item(store, user.user_id, id).await?;

    let changes = line_item_changes(&body, !partial)?;
    check_references(store, user.user_id, Some(&existing), &changes).await?;

    let item = store
        .update_line_item(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    tracing::info!(user_id = user.user_id, line_item_id = id, "Updated line item");
    let view = Expander::new(store).line_item_view(item).await?;
    Ok(ApiResponse::success(view))
}

/// PUT /line-item/:id/
pub async fn replace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<LineItemView> {
    update(state, user, &id, body, false).await
}

/// PATCH /line-item/:id/
pub async fn patch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<LineItemView> {
    update(state, user, &id, body, true).await
}

/// DELETE /line-item/:id/
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = params::path_id(&id)?;
    access::owned_line_item(state.store.as_ref(), user.user_id, id).await?;
    state.store.delete_line_item(id).await?;

    tracing::info!(user_id = user.user_id, line_item_id = id, "Deleted line item");
    Ok(ApiResponse::no_content())
}
