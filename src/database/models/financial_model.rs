use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::types::ModelType;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FinancialModel {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub name: String,
    pub version: String,
    #[sqlx(try_from = "String")]
    pub model_type: ModelType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFinancialModel {
    pub name: String,
    pub version: String,
    pub model_type: ModelType,
}

#[derive(Debug, Clone, Default)]
pub struct FinancialModelChanges {
    pub name: Option<String>,
    pub version: Option<String>,
    pub model_type: Option<ModelType>,
}
