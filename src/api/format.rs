//! Wire representations with related rows expanded into nested read-only objects.
//!
//! Writes reference related rows by `model_id` / `scenario_id` / `period_id`;
//! reads embed the related row instead and never echo the id fields.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::database::models::{Assumption, FinancialModel, LineItem, Period, Scenario};
use crate::database::Store;
use crate::error::ApiError;
use crate::types::Category;

/// Scenario with its model embedded
#[derive(Debug, Serialize)]
pub struct ScenarioView {
    pub id: i64,
    pub model: FinancialModel,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct LineItemView {
    pub id: i64,
    pub model: FinancialModel,
    /// `{id, name, description}`
    pub scenario: Scenario,
    pub period: Period,
    pub name: String,
    pub category: Category,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AssumptionView {
    pub id: i64,
    pub model: FinancialModel,
    pub scenario: Scenario,
    pub name: String,
    pub value: Decimal,
    pub unit: String,
}

/// Resolves related rows for a batch of records, fetching each id once
pub struct Expander<'a> {
    store: &'a dyn Store,
    models: HashMap<i64, FinancialModel>,
    scenarios: HashMap<i64, Scenario>,
    periods: HashMap<i64, Period>,
}

impl<'a> Expander<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            models: HashMap::new(),
            scenarios: HashMap::new(),
            periods: HashMap::new(),
        }
    }

    async fn model(&mut self, id: i64) -> Result<FinancialModel, ApiError> {
        if let Some(model) = self.models.get(&id) {
            return Ok(model.clone());
        }
        let model = self.store.get_model(id).await?.ok_or_else(|| dangling("model", id))?;
        self.models.insert(id, model.clone());
        Ok(model)
    }

    async fn scenario(&mut self, id: i64) -> Result<Scenario, ApiError> {
        if let Some(scenario) = self.scenarios.get(&id) {
            return Ok(scenario.clone());
        }
        let scenario = self
            .store
            .get_scenario(id)
            .await?
            .ok_or_else(|| dangling("scenario", id))?;
        self.scenarios.insert(id, scenario.clone());
        Ok(scenario)
    }

    async fn period(&mut self, id: i64) -> Result<Period, ApiError> {
        if let Some(period) = self.periods.get(&id) {
            return Ok(period.clone());
        }
        let period = self.store.get_period(id).await?.ok_or_else(|| dangling("period", id))?;
        self.periods.insert(id, period.clone());
        Ok(period)
    }

    pub async fn scenario_view(&mut self, scenario: Scenario) -> Result<ScenarioView, ApiError> {
        Ok(ScenarioView {
            id: scenario.id,
            model: self.model(scenario.model_id).await?,
            name: scenario.name,
            description: scenario.description,
        })
    }

    pub async fn line_item_view(&mut self, item: LineItem) -> Result<LineItemView, ApiError> {
        Ok(LineItemView {
            id: item.id,
            model: self.model(item.model_id).await?,
            scenario: self.scenario(item.scenario_id).await?,
            period: self.period(item.period_id).await?,
            name: item.name,
            category: item.category,
            amount: item.amount,
        })
    }

    pub async fn assumption_view(&mut self, assumption: Assumption) -> Result<AssumptionView, ApiError> {
        Ok(AssumptionView {
            id: assumption.id,
            model: self.model(assumption.model_id).await?,
            scenario: self.scenario(assumption.scenario_id).await?,
            name: assumption.name,
            value: assumption.value,
            unit: assumption.unit,
        })
    }

    pub async fn scenario_views(&mut self, rows: Vec<Scenario>) -> Result<Vec<ScenarioView>, ApiError> {
        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            views.push(self.scenario_view(row).await?);
        }
        Ok(views)
    }

    pub async fn line_item_views(&mut self, rows: Vec<LineItem>) -> Result<Vec<LineItemView>, ApiError> {
        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            views.push(self.line_item_view(row).await?);
        }
        Ok(views)
    }

    pub async fn assumption_views(&mut self, rows: Vec<Assumption>) -> Result<Vec<AssumptionView>, ApiError> {
        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            views.push(self.assumption_view(row).await?);
        }
        Ok(views)
    }
}

// Foreign keys cascade, so a missing parent means a concurrent delete
fn dangling(kind: &str, id: i64) -> ApiError {
    tracing::warn!(kind, id, "Related row disappeared while rendering");
    ApiError::not_found("Not found.")
}
