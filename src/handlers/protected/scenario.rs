// /scenario/ - scenarios, owned through their financial model

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    Extension,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::format::ScenarioView;
use crate::api::{params, Expander, Page, Paginator};
use crate::database::models::{NewScenario, ScenarioChanges, ScenarioFilter};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::access;
use crate::state::AppState;

const NAME_MAX: usize = 100;

fn scenario_changes(body: &Value, required: bool) -> Result<ScenarioChanges, ApiError> {
    let mut errors = FieldErrors::new();
    let model_id = params::pk(&mut errors, body, "model_id");
    let model_id = params::required(&mut errors, "model_id", model_id, required);
    let name = params::text(&mut errors, body, "name", NAME_MAX, required);
    // Description may be blank
    let description = params::string(&mut errors, body, "description");
    errors.into_result()?;

    Ok(ScenarioChanges {
        model_id,
        name,
        description,
    })
}

/// GET /scenario/?model_id=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
) -> ApiResult<Page<ScenarioView>> {
    let mut errors = FieldErrors::new();
    let filter = ScenarioFilter {
        model_id: params::query_id(&mut errors, &query, "model_id"),
    };
    errors.into_result()?;

    let store = state.store.as_ref();
    let owner = user.user_id;
    let filter = &filter;

    let mut paginator = Paginator::from_uri(&uri, state.page_size())?;
    let listing = paginator
        .fetch(move |page| store.list_scenarios(owner, filter, page))
        .await?;

    let mut page = paginator.finish(listing)?;
    let rows = std::mem::take(&mut page.results);
    let views = Expander::new(store).scenario_views(rows).await?;
    Ok(ApiResponse::success(page.with_results(views)))
}

/// POST /scenario/ - `model_id` must name one of the caller's models
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ScenarioView> {
    let changes = scenario_changes(&body, true)?;
    let model_id = params::take(changes.model_id, "model_id")?;
    access::referenced_model(state.store.as_ref(), user.user_id, model_id).await?;

    let scenario = state
        .store
        .insert_scenario(NewScenario {
            model_id,
            name: params::take(changes.name, "name")?,
            description: changes.description.unwrap_or_default(),
        })
        .await?;

    tracing::info!(user_id = user.user_id, scenario_id = scenario.id, model_id, "Created scenario");
    let view = Expander::new(state.store.as_ref()).scenario_view(scenario).await?;
    Ok(ApiResponse::created(view))
}

/// GET /scenario/:id/
pub async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<ScenarioView> {
    let id = params::path_id(&id)?;
    let scenario = access::owned_scenario(state.store.as_ref(), user.user_id, id).await?;
    let view = Expander::new(state.store.as_ref()).scenario_view(scenario).await?;
    Ok(ApiResponse::success(view))
}

async fn update(state: AppState, user: AuthUser, id: &str, body: Value, partial: bool) -> ApiResult<ScenarioView> {
    let id = params::path_id(id)?;
    let store = state.store.as_ref();
    let existing = access::owned_scenario(store, user.user_id, id).await?;

    let changes = scenario_changes(&body, !partial)?;
    if let Some(model_id) = changes.model_id.filter(|m| *m != existing.model_id) {
        // Moving a scenario requires owning the destination too
        access::referenced_model(store, user.user_id, model_id).await?;
    }

    let scenario = store
        .update_scenario(id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;

    tracing::info!(user_id = user.user_id, scenario_id = id, "Updated scenario");
    let view = Expander::new(store).scenario_view(scenario).await?;
    Ok(ApiResponse::success(view))
}

/// PUT /scenario/:id/
pub async fn replace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ScenarioView> {
    update(state, user, &id, body, false).await
}

/// PATCH /scenario/:id/
pub async fn patch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<ScenarioView> {
    update(state, user, &id, body, true).await
}

/// DELETE /scenario/:id/ - cascades to line items and assumptions
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = params::path_id(&id)?;
    access::owned_scenario(state.store.as_ref(), user.user_id, id).await?;
    state.store.delete_scenario(id).await?;

    tracing::info!(user_id = user.user_id, scenario_id = id, "Deleted scenario");
    Ok(ApiResponse::no_content())
}
