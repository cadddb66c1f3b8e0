use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Assumption {
    pub id: i64,
    pub model_id: i64,
    pub scenario_id: i64,
    pub name: String,
    pub value: Decimal,
    pub unit: String,
}

#[derive(Debug, Clone)]
pub struct NewAssumption {
    pub model_id: i64,
    pub scenario_id: i64,
    pub name: String,
    pub value: Decimal,
    pub unit: String,
}

#[derive(Debug, Clone, Default)]
pub struct AssumptionChanges {
    pub model_id: Option<i64>,
    pub scenario_id: Option<i64>,
    pub name: Option<String>,
    pub value: Option<Decimal>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssumptionFilter {
    pub model_id: Option<i64>,
    pub scenario_id: Option<i64>,
}

impl AssumptionFilter {
    pub fn matches(&self, assumption: &Assumption) -> bool {
        self.model_id.map_or(true, |id| assumption.model_id == id)
            && self.scenario_id.map_or(true, |id| assumption.scenario_id == id)
    }
}
