// /assumption/ - named model inputs per scenario

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    Extension,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::format::AssumptionView;
use crate::api::{params, Expander, Page, Paginator};
use crate::database::models::{Assumption, AssumptionChanges, AssumptionFilter, NewAssumption};
use crate::database::Store;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::access;
use crate::state::AppState;

const NAME_MAX: usize = 100;
const UNIT_MAX: usize = 20;
const VALUE_DIGITS: u32 = 10;
const VALUE_PLACES: u32 = 4;
const DEFAULT_UNIT: &str = "%";

fn assumption_changes(body: &Value, required: bool) -> Result<AssumptionChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let model_id = params::pk(&mut errors, body, "model_id");
    let scenario_id = params::pk(&mut errors, body, "scenario_id");
    let name = params::text(&mut errors, body, "name", NAME_MAX, required);
    let value = params::decimal(&mut errors, body, "value", VALUE_DIGITS, VALUE_PLACES);
    // Unit has a default, so it is never required
    let unit = params::text(&mut errors, body, "unit", UNIT_MAX, false);

    let changes = AssumptionChanges {
        model_id: params::required(&mut errors, "model_id", model_id, required),
        scenario_id: params::required(&mut errors, "scenario_id", scenario_id, required),
        name,
        value: params::required(&mut errors, "value", value, required),
        unit,
    };
    errors.into_result()?;
    Ok(changes)
}

async fn check_references(
    store: &dyn Store,
    user_id: i64,
    existing: Option<&Assumption>,
    changes: &AssumptionChanges,
) -> Result<(), ApiError> {
    let model_id = changes.model_id.or(existing.map(|a| a.model_id));
    let scenario_id = changes.scenario_id.or(existing.map(|a| a.scenario_id));

    if let Some(model_id) = changes.model_id {
        access::referenced_model(store, user_id, model_id).await?;
    }
    if changes.model_id.is_some() || changes.scenario_id.is_some() {
        if let (Some(model_id), Some(scenario_id)) = (model_id, scenario_id) {
            access::referenced_scenario(store, model_id, scenario_id).await?;
        }
    }
    Ok(())
}

/// GET /assumption/?model_id=&scenario_id=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
) -> ApiResult<Page<AssumptionView>> {
    let mut errors = FieldErrors::new();
    let filter = AssumptionFilter {
        model_id: params::query_id(&mut errors, &query, "model_id"),
        scenario_id: params::query_id(&mut errors, &query, "scenario_id"),
    };
    errors.into_result()?;

    let store = state.store.as_ref();
    let owner = user.user_id;
    let filter = &filter;

    let mut paginator = Paginator::from_uri(&uri, state.page_size())?;
    let listing = paginator
        .fetch(move |page| store.list_assumptions(owner, filter, page))
        .await?;

    let mut page = paginator.finish(listing)?;
    let rows = std::mem::take(&mut page.results);
    let views = Expander::new(store).assumption_views(rows).await?;
    Ok(ApiResponse::success(page.with_results(views)))
}

/// POST /assumption/
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<AssumptionView> {
    let store = state.store.as_ref();
    let changes = assumption_changes(&body, true)?;
    check_references(store, user.user_id, None, &changes).await?;

    let assumption = store
        .insert_assumption(NewAssumption {
            model_id: params::take(changes.model_id, "model_id")?,
            scenario_id: params::take(changes.scenario_id, "scenario_id")?,
            name: params::take(changes.name, "name")?,
            value: params::take(changes.value, "value")?,
            unit: changes.unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        })
        .await?;

    tracing::info!(user_id = user.user_id, assumption_id = assumption.id, "Created assumption");
    let view = Expander::new(store).assumption_view(assumption).await?;
    Ok(ApiResponse::created(view))
}

/// GET /assumption/:id/
pub async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<AssumptionView> {
    let id = params::path_id(&id)?;
    let assumption = access::owned_assumption(state.store.as_ref(), user.user_id, id).await?;
    let view = Expander::new(state.store.as_ref()).assumption_view(assumption).await?;
    Ok(ApiResponse::success(view))
}

async fn update(state: AppState, user: AuthUser, id: &str, body: Value, partial: bool) -> ApiResult<AssumptionView> {
    let id = params::path_id(id)?;
    let store = state.store.as_ref();
    let existing = access::owned_assumption(store, user.user_id, id).await?;

    let changes = assumption_changes(&body, !partial)?;
    check_references(store, user.user_id, Some(&existing), &changes).await?;

    let assumption = store
        .update_assumption(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    tracing::info!(user_id = user.user_id, assumption_id = id, "Updated assumption");
    let view = Expander::new(store).assumption_view(assumption).await?;
    Ok(ApiResponse::success(view))
}

/// PUT /assumption/:id/
pub async fn replace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<AssumptionView> {
    update(state, user, &id, body, false).await
}

/// PATCH /assumption/:id/
pub async fn patch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<AssumptionView> {
    update(state, user, &id, body, true).await
}

/// DELETE /assumption/:id/
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = params::path_id(&id)?;
    access::owned_assumption(state.store.as_ref(), user.user_id, id).await?;
    state.store.delete_assumption(id).await?;

    tracing::info!(user_id = user.user_id, assumption_id = id, "Deleted assumption");
    Ok(ApiResponse::no_content())
}
