use async_trait::async_trait;

use super::models::{
    Assumption, AssumptionChanges, AssumptionFilter, FinancialModel, FinancialModelChanges, LineItem,
    LineItemChanges, LineItemFilter, NewAssumption, NewFinancialModel, NewLineItem, NewPeriod, NewScenario,
    NewUser, Period, PeriodFilter, ProfileChanges, Scenario, ScenarioChanges, ScenarioFilter, User,
};
use super::DatabaseError;

/// Window into an ordered collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

/// One page of rows plus the size of the whole filtered collection
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub rows: Vec<T>,
    pub count: i64,
}

/// Persistence operations the HTTP layer depends on.
///
/// Rows are returned unfiltered by owner unless the method takes an `owner`;
/// ownership decisions live in `services::access`. Lists are ordered by id.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), DatabaseError>;

    // Users
    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
    /// Which of the unique user fields are already in use
    async fn taken_user_fields(
        &self,
        username: &str,
        email: &str,
        phone_number: &str,
    ) -> Result<Vec<&'static str>, DatabaseError>;
    async fn update_profile(&self, id: i64, changes: ProfileChanges) -> Result<Option<User>, DatabaseError>;

    // Financial models
    async fn list_models(&self, owner: i64, page: PageRequest) -> Result<Listing<FinancialModel>, DatabaseError>;
    async fn get_model(&self, id: i64) -> Result<Option<FinancialModel>, DatabaseError>;
    async fn insert_model(&self, owner: i64, model: NewFinancialModel) -> Result<FinancialModel, DatabaseError>;
    async fn update_model(
        &self,
        id: i64,
        changes: FinancialModelChanges,
    ) -> Result<Option<FinancialModel>, DatabaseError>;
    /// Cascades to scenarios, line items and assumptions
    async fn delete_model(&self, id: i64) -> Result<bool, DatabaseError>;

    // Periods
    async fn list_periods(&self, filter: &PeriodFilter, page: PageRequest) -> Result<Listing<Period>, DatabaseError>;
    async fn get_period(&self, id: i64) -> Result<Option<Period>, DatabaseError>;
    async fn insert_period(&self, period: NewPeriod) -> Result<Period, DatabaseError>;

    // Scenarios
    async fn list_scenarios(
        &self,
        owner: i64,
        filter: &ScenarioFilter,
        page: PageRequest,
    ) -> Result<Listing<Scenario>, DatabaseError>;
    async fn get_scenario(&self, id: i64) -> Result<Option<Scenario>, DatabaseError>;
    async fn insert_scenario(&self, scenario: NewScenario) -> Result<Scenario, DatabaseError>;
    async fn update_scenario(&self, id: i64, changes: ScenarioChanges) -> Result<Option<Scenario>, DatabaseError>;
    /// Cascades to line items and assumptions
    async fn delete_scenario(&self, id: i64) -> Result<bool, DatabaseError>;

    // Line items
    async fn list_line_items(
        &self,
        owner: i64,
        filter: &LineItemFilter,
        page: PageRequest,
    ) -> Result<Listing<LineItem>, DatabaseError>;
    async fn get_line_item(&self, id: i64) -> Result<Option<LineItem>, DatabaseError>;
    async fn insert_line_item(&self, item: NewLineItem) -> Result<LineItem, DatabaseError>;
    async fn update_line_item(&self, id: i64, changes: LineItemChanges) -> Result<Option<LineItem>, DatabaseError>;
    async fn delete_line_item(&self, id: i64) -> Result<bool, DatabaseError>;

    // Assumptions
    async fn list_assumptions(
        &self,
        owner: i64,
        filter: &AssumptionFilter,
        page: PageRequest,
    ) -> Result<Listing<Assumption>, DatabaseError>;
    async fn get_assumption(&self, id: i64) -> Result<Option<Assumption>, DatabaseError>;
    async fn insert_assumption(&self, assumption: NewAssumption) -> Result<Assumption, DatabaseError>;
    async fn update_assumption(
        &self,
        id: i64,
        changes: AssumptionChanges,
    ) -> Result<Option<Assumption>, DatabaseError>;
    async fn delete_assumption(&self, id: i64) -> Result<bool, DatabaseError>;
}
