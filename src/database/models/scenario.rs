use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Scenario {
    pub id: i64,
    #[serde(skip_serializing)]
    pub model_id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewScenario {
    pub model_id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioChanges {
    pub model_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    pub model_id: Option<i64>,
}
