// /period/ - global period lookup table, readable and creatable by any caller

use axum::{
    extract::{Path, Query, State},
    http::Uri,
};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::{params, Page, Paginator};
use crate::database::models::{NewPeriod, Period, PeriodFilter};
use crate::error::{ApiError, FieldErrors};
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::state::AppState;

const LABEL_MAX: usize = 20;

fn period_filter(query: &HashMap<String, String>) -> Result<PeriodFilter, ApiError> {
    let mut errors = FieldErrors::new();
    let filter = PeriodFilter {
        period_type: params::query_choice(&mut errors, query, "period_type"),
        start_date: params::query_date(&mut errors, query, "start_date"),
        end_date: params::query_date(&mut errors, query, "end_date"),
    };
    errors.into_result()?;
    Ok(filter)
}

fn new_period(body: &Value) -> Result<NewPeriod, ApiError> {
    let mut errors = FieldErrors::new();
    let label = params::text(&mut errors, body, "label", LABEL_MAX, true);
    let start_date = params::date(&mut errors, body, "start_date");
    let start_date = errors.require("start_date", start_date);
    let end_date = params::date(&mut errors, body, "end_date");
    let end_date = errors.require("end_date", end_date);
    let period_type = params::choice(&mut errors, body, "period_type");
    let period_type = errors.require("period_type", period_type);

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            errors.add("end_date", "End date must not be before start date.");
        }
    }
    errors.into_result()?;

    Ok(NewPeriod {
        label: params::take(label, "label")?,
        start_date: params::take(start_date, "start_date")?,
        end_date: params::take(end_date, "end_date")?,
        period_type: params::take(period_type, "period_type")?,
    })
}

/// GET /period/?period_type=&start_date=&end_date=
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    uri: Uri,
) -> ApiResult<Page<Period>> {
    let filter = period_filter(&query)?;
    let store = state.store.as_ref();
    let filter = &filter;

    let mut paginator = Paginator::from_uri(&uri, state.page_size())?;
    let listing = paginator.fetch(move |page| store.list_periods(filter, page)).await?;
    Ok(ApiResponse::success(paginator.finish(listing)?))
}

/// POST /period/
pub async fn create(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<Period> {
    let period = state.store.insert_period(new_period(&body)?).await?;
    tracing::info!(period_id = period.id, "Created period");
    Ok(ApiResponse::created(period))
}

/// GET /period/:id/
pub async fn retrieve(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Period> {
    let id = params::path_id(&id)?;
    let period = state
        .store
        .get_period(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found."))?;
    Ok(ApiResponse::success(period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_period_type_filter_is_rejected() {
        let query = HashMap::from([("period_type".to_string(), "weekly".to_string())]);
        let err = period_filter(&query).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.field_errors().unwrap().contains_key("period_type"));
    }

    #[test]
    fn filter_parses_dates() {
        let query = HashMap::from([
            ("start_date".to_string(), "2024-01-01".to_string()),
            ("end_date".to_string(), "2024-12-31".to_string()),
        ]);
        let filter = period_filter(&query).unwrap();
        assert!(filter.start_date.is_some());
        assert!(filter.end_date.is_some());
        assert!(filter.period_type.is_none());
    }

    #[test]
    fn start_after_end_is_invalid() {
        let body = json!({
            "label": "Q1",
            "start_date": "2024-03-31",
            "end_date": "2024-01-01",
            "period_type": "quarterly",
        });
        let err = new_period(&body).unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("end_date"));
    }

    #[test]
    fn bad_date_format_is_reported() {
        let body = json!({
            "label": "Q1",
            "start_date": "01/01/2024",
            "end_date": "2024-03-31",
            "period_type": "quarterly",
        });
        let err = new_period(&body).unwrap_err();
        assert_eq!(
            err.field_errors().unwrap()["start_date"],
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD."
        );
    }
}
