use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::types::Category;

#[derive(Debug, Clone, FromRow)]
pub struct LineItem {
    pub id: i64,
    pub model_id: i64,
    pub scenario_id: i64,
    pub period_id: i64,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub category: Category,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub model_id: i64,
    pub scenario_id: i64,
    pub period_id: i64,
    pub name: String,
    pub category: Category,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct LineItemChanges {
    pub model_id: Option<i64>,
    pub scenario_id: Option<i64>,
    pub period_id: Option<i64>,
    pub name: Option<String>,
    pub category: Option<Category>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct LineItemFilter {
    pub model_id: Option<i64>,
    pub scenario_id: Option<i64>,
    pub period_id: Option<i64>,
}

impl LineItemFilter {
    pub fn matches(&self, item: &LineItem) -> bool {
        self.model_id.map_or(true, |id| item.model_id == id)
            && self.scenario_id.map_or(true, |id| item.scenario_id == id)
            && self.period_id.map_or(true, |id| item.period_id == id)
    }
}
