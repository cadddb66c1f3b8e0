// Ownership checks layered over the store.
//
// Financial models belong to the user that created them. Scenarios, line
// items and assumptions belong to whoever owns their model. Periods are
// global. Rows addressed by URL answer 404 when missing and 403 when owned by
// someone else; rows referenced from a request body answer 400 when missing.

use crate::database::models::{Assumption, FinancialModel, LineItem, Period, Scenario};
use crate::database::Store;
use crate::error::ApiError;

const FORBIDDEN: &str = "You do not have permission to perform this action.";

fn not_found() -> ApiError {
    ApiError::not_found("Not found.")
}

fn missing_reference(field: &str, id: i64) -> ApiError {
    ApiError::field(field, format!("Invalid pk \"{}\" - object does not exist.", id))
}

fn ensure_owner(model: &FinancialModel, user_id: i64) -> Result<(), ApiError> {
    if model.user_id == user_id {
        Ok(())
    } else {
        tracing::warn!(user_id, model_id = model.id, "Cross-owner access denied");
        Err(ApiError::forbidden(FORBIDDEN))
    }
}

/// Model addressed by URL
pub async fn owned_model(store: &dyn Store, user_id: i64, id: i64) -> Result<FinancialModel, ApiError> {
    let model = store.get_model(id).await?.ok_or_else(not_found)?;
    ensure_owner(&model, user_id)?;
    Ok(model)
}

/// Model referenced by `model_id` in a request body
pub async fn referenced_model(store: &dyn Store, user_id: i64, id: i64) -> Result<FinancialModel, ApiError> {
    let model = store
        .get_model(id)
        .await?
        .ok_or_else(|| missing_reference("model_id", id))?;
    ensure_owner(&model, user_id)?;
    Ok(model)
}

pub async fn owned_scenario(store: &dyn Store, user_id: i64, id: i64) -> Result<Scenario, ApiError> {
    let scenario = store.get_scenario(id).await?.ok_or_else(not_found)?;
    owned_model(store, user_id, scenario.model_id).await?;
    Ok(scenario)
}

/// Scenario referenced by `scenario_id`; it must hang off `model_id`
pub async fn referenced_scenario(store: &dyn Store, model_id: i64, id: i64) -> Result<Scenario, ApiError> {
    let scenario = store
        .get_scenario(id)
        .await?
        .ok_or_else(|| missing_reference("scenario_id", id))?;
    if scenario.model_id != model_id {
        return Err(ApiError::field(
            "scenario_id",
            "Scenario does not belong to the selected financial model.",
        ));
    }
    Ok(scenario)
}

pub async fn referenced_period(store: &dyn Store, id: i64) -> Result<Period, ApiError> {
    store
        .get_period(id)
        .await?
        .ok_or_else(|| missing_reference("period_id", id))
}

pub async fn owned_line_item(store: &dyn Store, user_id: i64, id: i64) -> Result<LineItem, ApiError> {
    let item = store.get_line_item(id).await?.ok_or_else(not_found)?;
    owned_model(store, user_id, item.model_id).await?;
    Ok(item)
}

pub async fn owned_assumption(store: &dyn Store, user_id: i64, id: i64) -> Result<Assumption, ApiError> {
    let assumption = store.get_assumption(id).await?.ok_or_else(not_found)?;
    owned_model(store, user_id, assumption.model_id).await?;
    Ok(assumption)
}
