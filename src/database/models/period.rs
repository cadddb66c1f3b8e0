use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use crate::types::PeriodType;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Period {
    pub id: i64,
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub period_type: PeriodType,
}

#[derive(Debug, Clone)]
pub struct NewPeriod {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub period_type: PeriodType,
}

/// `start_date` keeps periods starting on or after it, `end_date` those ending on or before it
#[derive(Debug, Clone, Default)]
pub struct PeriodFilter {
    pub period_type: Option<PeriodType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl PeriodFilter {
    pub fn matches(&self, period: &Period) -> bool {
        self.period_type.map_or(true, |t| period.period_type == t)
            && self.start_date.map_or(true, |d| period.start_date >= d)
            && self.end_date.map_or(true, |d| period.end_date <= d)
    }
}
