use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::models::{
    Assumption, AssumptionChanges, AssumptionFilter, FinancialModel, FinancialModelChanges, LineItem,
    LineItemChanges, LineItemFilter, NewAssumption, NewFinancialModel, NewLineItem, NewPeriod, NewScenario,
    NewUser, Period, PeriodFilter, ProfileChanges, Scenario, ScenarioChanges, ScenarioFilter, User,
};
use super::store::{Listing, PageRequest, Store};
use super::DatabaseError;

/// Rows keyed by id; `next_id` never reuses a deleted id
#[derive(Debug)]
struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[derive(Debug, Default)]
struct Tables {
    users: Table<User>,
    models: Table<FinancialModel>,
    periods: Table<Period>,
    scenarios: Table<Scenario>,
    line_items: Table<LineItem>,
    assumptions: Table<Assumption>,
}

impl Tables {
    fn owns_model(&self, owner: i64, model_id: i64) -> bool {
        self.models.rows.get(&model_id).map_or(false, |m| m.user_id == owner)
    }

    fn check_user_unique(&self, user: &NewUser) -> Result<(), DatabaseError> {
        for existing in self.users.rows.values() {
            if existing.username == user.username {
                return Err(DatabaseError::UniqueViolation("username".into()));
            }
            if existing.email == user.email {
                return Err(DatabaseError::UniqueViolation("email".into()));
            }
            if existing.phone_number == user.phone_number {
                return Err(DatabaseError::UniqueViolation("phone_number".into()));
            }
        }
        Ok(())
    }

    fn check_model(&self, id: i64) -> Result<(), DatabaseError> {
        if self.models.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(DatabaseError::ForeignKeyViolation("model_id".into()))
        }
    }

    fn check_scenario(&self, id: i64) -> Result<(), DatabaseError> {
        if self.scenarios.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(DatabaseError::ForeignKeyViolation("scenario_id".into()))
        }
    }

    fn check_period(&self, id: i64) -> Result<(), DatabaseError> {
        if self.periods.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(DatabaseError::ForeignKeyViolation("period_id".into()))
        }
    }

    fn remove_scenario_cascade(&mut self, id: i64) -> bool {
        let removed = self.scenarios.rows.remove(&id).is_some();
        if removed {
            self.line_items.rows.retain(|_, item| item.scenario_id != id);
            self.assumptions.rows.retain(|_, a| a.scenario_id != id);
        }
        removed
    }
}

fn paginate<T: Clone>(rows: Vec<&T>, page: PageRequest) -> Listing<T> {
    let count = rows.len() as i64;
    let offset = usize::try_from(page.offset.max(0)).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit.max(0)).unwrap_or(usize::MAX);
    Listing {
        rows: rows.into_iter().skip(offset).take(limit).cloned().collect(),
        count,
    }
}

/// `Store` held in process memory.
///
/// Mirrors the Postgres schema's unique, foreign-key and cascade rules so the
/// HTTP layer behaves the same against either backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(&user)?;

        let id = tables.users.allocate();
        let row = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            company_name: user.company_name,
            phone_number: user.phone_number,
            created_at: Utc::now(),
        };
        tables.users.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        Ok(self.tables.read().await.users.rows.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.rows.values().find(|u| u.email == email).cloned())
    }

    async fn taken_user_fields(
        &self,
        username: &str,
        email: &str,
        phone_number: &str,
    ) -> Result<Vec<&'static str>, DatabaseError> {
        let tables = self.tables.read().await;
        let users = &tables.users.rows;
        let mut taken = Vec::new();
        if users.values().any(|u| u.username == username) {
            taken.push("username");
        }
        if users.values().any(|u| u.email == email) {
            taken.push("email");
        }
        if users.values().any(|u| u.phone_number == phone_number) {
            taken.push("phone_number");
        }
        Ok(taken)
    }

    async fn update_profile(&self, id: i64, changes: ProfileChanges) -> Result<Option<User>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.first_name {
            user.first_name = v;
        }
        if let Some(v) = changes.last_name {
            user.last_name = v;
        }
        if let Some(v) = changes.company_name {
            user.company_name = v;
        }
        Ok(Some(user.clone()))
    }

    async fn list_models(&self, owner: i64, page: PageRequest) -> Result<Listing<FinancialModel>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables.models.rows.values().filter(|m| m.user_id == owner).collect();
        Ok(paginate(rows, page))
    }

    async fn get_model(&self, id: i64) -> Result<Option<FinancialModel>, DatabaseError> {
        Ok(self.tables.read().await.models.rows.get(&id).cloned())
    }

    async fn insert_model(&self, owner: i64, model: NewFinancialModel) -> Result<FinancialModel, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.users.rows.contains_key(&owner) {
            return Err(DatabaseError::ForeignKeyViolation("user_id".into()));
        }

        let id = tables.models.allocate();
        let row = FinancialModel {
            id,
            user_id: owner,
            name: model.name,
            version: model.version,
            model_type: model.model_type,
            created_at: Utc::now(),
        };
        tables.models.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update_model(
        &self,
        id: i64,
        changes: FinancialModelChanges,
    ) -> Result<Option<FinancialModel>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(model) = tables.models.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.name {
            model.name = v;
        }
        if let Some(v) = changes.version {
            model.version = v;
        }
        if let Some(v) = changes.model_type {
            model.model_type = v;
        }
        Ok(Some(model.clone()))
    }

    async fn delete_model(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.models.rows.remove(&id).is_none() {
            return Ok(false);
        }

        let scenario_ids: Vec<i64> = tables
            .scenarios
            .rows
            .values()
            .filter(|s| s.model_id == id)
            .map(|s| s.id)
            .collect();
        for scenario_id in scenario_ids {
            tables.remove_scenario_cascade(scenario_id);
        }
        tables.line_items.rows.retain(|_, item| item.model_id != id);
        tables.assumptions.rows.retain(|_, a| a.model_id != id);
        Ok(true)
    }

    async fn list_periods(&self, filter: &PeriodFilter, page: PageRequest) -> Result<Listing<Period>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables.periods.rows.values().filter(|p| filter.matches(p)).collect();
        Ok(paginate(rows, page))
    }

    async fn get_period(&self, id: i64) -> Result<Option<Period>, DatabaseError> {
        Ok(self.tables.read().await.periods.rows.get(&id).cloned())
    }

    async fn insert_period(&self, period: NewPeriod) -> Result<Period, DatabaseError> {
        let mut tables = self.tables.write().await;
        let id = tables.periods.allocate();
        let row = Period {
            id,
            label: period.label,
            start_date: period.start_date,
            end_date: period.end_date,
            period_type: period.period_type,
        };
        tables.periods.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn list_scenarios(
        &self,
        owner: i64,
        filter: &ScenarioFilter,
        page: PageRequest,
    ) -> Result<Listing<Scenario>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .scenarios
            .rows
            .values()
            .filter(|s| tables.owns_model(owner, s.model_id))
            .filter(|s| filter.model_id.map_or(true, |id| s.model_id == id))
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_scenario(&self, id: i64) -> Result<Option<Scenario>, DatabaseError> {
        Ok(self.tables.read().await.scenarios.rows.get(&id).cloned())
    }

    async fn insert_scenario(&self, scenario: NewScenario) -> Result<Scenario, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.check_model(scenario.model_id)?;

        let id = tables.scenarios.allocate();
        let row = Scenario {
            id,
            model_id: scenario.model_id,
            name: scenario.name,
            description: scenario.description,
        };
        tables.scenarios.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update_scenario(&self, id: i64, changes: ScenarioChanges) -> Result<Option<Scenario>, DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(model_id) = changes.model_id {
            tables.check_model(model_id)?;
        }
        let Some(scenario) = tables.scenarios.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.model_id {
            scenario.model_id = v;
        }
        if let Some(v) = changes.name {
            scenario.name = v;
        }
        if let Some(v) = changes.description {
            scenario.description = v;
        }
        let scenario = scenario.clone();

        // Children follow their scenario to its new model
        for item in tables.line_items.rows.values_mut().filter(|i| i.scenario_id == id) {
            item.model_id = scenario.model_id;
        }
        for assumption in tables.assumptions.rows.values_mut().filter(|a| a.scenario_id == id) {
            assumption.model_id = scenario.model_id;
        }
        Ok(Some(scenario))
    }

    async fn delete_scenario(&self, id: i64) -> Result<bool, DatabaseError> {
        Ok(self.tables.write().await.remove_scenario_cascade(id))
    }

    async fn list_line_items(
        &self,
        owner: i64,
        filter: &LineItemFilter,
        page: PageRequest,
    ) -> Result<Listing<LineItem>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .line_items
            .rows
            .values()
            .filter(|item| tables.owns_model(owner, item.model_id))
            .filter(|item| filter.matches(item))
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_line_item(&self, id: i64) -> Result<Option<LineItem>, DatabaseError> {
        Ok(self.tables.read().await.line_items.rows.get(&id).cloned())
    }

    async fn insert_line_item(&self, item: NewLineItem) -> Result<LineItem, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.check_model(item.model_id)?;
        tables.check_scenario(item.scenario_id)?;
        tables.check_period(item.period_id)?;

        let id = tables.line_items.allocate();
        let row = LineItem {
            id,
            model_id: item.model_id,
            scenario_id: item.scenario_id,
            period_id: item.period_id,
            name: item.name,
            category: item.category,
            amount: item.amount,
        };
        tables.line_items.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update_line_item(&self, id: i64, changes: LineItemChanges) -> Result<Option<LineItem>, DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(model_id) = changes.model_id {
            tables.check_model(model_id)?;
        }
        if let Some(scenario_id) = changes.scenario_id {
            tables.check_scenario(scenario_id)?;
        }
        if let Some(period_id) = changes.period_id {
            tables.check_period(period_id)?;
        }
        let Some(item) = tables.line_items.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.model_id {
            item.model_id = v;
        }
        if let Some(v) = changes.scenario_id {
            item.scenario_id = v;
        }
        if let Some(v) = changes.period_id {
            item.period_id = v;
        }
        if let Some(v) = changes.name {
            item.name = v;
        }
        if let Some(v) = changes.category {
            item.category = v;
        }
        if let Some(v) = changes.amount {
            item.amount = v;
        }
        Ok(Some(item.clone()))
    }

    async fn delete_line_item(&self, id: i64) -> Result<bool, DatabaseError> {
        Ok(self.tables.write().await.line_items.rows.remove(&id).is_some())
    }

    async fn list_assumptions(
        &self,
        owner: i64,
        filter: &AssumptionFilter,
        page: PageRequest,
    ) -> Result<Listing<Assumption>, DatabaseError> {
        let tables = self.tables.read().await;
        let rows = tables
            .assumptions
            .rows
            .values()
            .filter(|a| tables.owns_model(owner, a.model_id))
            .filter(|a| filter.matches(a))
            .collect();
        Ok(paginate(rows, page))
    }

    async fn get_assumption(&self, id: i64) -> Result<Option<Assumption>, DatabaseError> {
        Ok(self.tables.read().await.assumptions.rows.get(&id).cloned())
    }

    async fn insert_assumption(&self, assumption: NewAssumption) -> Result<Assumption, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.check_model(assumption.model_id)?;
        tables.check_scenario(assumption.scenario_id)?;

        let id = tables.assumptions.allocate();
        let row = Assumption {
            id,
            model_id: assumption.model_id,
            scenario_id: assumption.scenario_id,
            name: assumption.name,
            value: assumption.value,
            unit: assumption.unit,
        };
        tables.assumptions.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update_assumption(
        &self,
        id: i64,
        changes: AssumptionChanges,
    ) -> Result<Option<Assumption>, DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(model_id) = changes.model_id {
            tables.check_model(model_id)?;
        }
        if let Some(scenario_id) = changes.scenario_id {
            tables.check_scenario(scenario_id)?;
        }
        let Some(assumption) = tables.assumptions.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.model_id {
            assumption.model_id = v;
        }
        if let Some(v) = changes.scenario_id {
            assumption.scenario_id = v;
        }
        if let Some(v) = changes.name {
            assumption.name = v;
        }
        if let Some(v) = changes.value {
            assumption.value = v;
        }
        if let Some(v) = changes.unit {
            assumption.unit = v;
        }
        Ok(Some(assumption.clone()))
    }

    async fn delete_assumption(&self, id: i64) -> Result<bool, DatabaseError> {
        Ok(self.tables.write().await.assumptions.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, ModelType, PeriodType};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn new_user(n: u32) -> NewUser {
        NewUser {
            username: format!("user{n}"),
            email: format!("user{n}@example.com"),
            password_hash: "hash".into(),
            first_name: "First".into(),
            last_name: "Last".into(),
            company_name: "Acme".into(),
            phone_number: format!("555000{n:04}"),
        }
    }

    fn new_model() -> NewFinancialModel {
        NewFinancialModel {
            name: "Plan".into(),
            version: "1".into(),
            model_type: ModelType::Budget,
        }
    }

    fn new_period() -> NewPeriod {
        NewPeriod {
            label: "Q1".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            period_type: PeriodType::Quarterly,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let store = MemoryStore::new();
        store.insert_user(new_user(1)).await.unwrap();
        let mut dup = new_user(2);
        dup.email = "user1@example.com".into();
        assert!(matches!(
            store.insert_user(dup).await,
            Err(DatabaseError::UniqueViolation(f)) if f == "email"
        ));
    }

    #[tokio::test]
    async fn ids_are_not_reused() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user(1)).await.unwrap();
        let first = store.insert_model(user.id, new_model()).await.unwrap();
        store.delete_model(first.id).await.unwrap();
        let second = store.insert_model(user.id, new_model()).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn deleting_a_model_cascades() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user(1)).await.unwrap();
        let model = store.insert_model(user.id, new_model()).await.unwrap();
        let period = store.insert_period(new_period()).await.unwrap();
        let scenario = store
            .insert_scenario(NewScenario {
                model_id: model.id,
                name: "Base".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let item = store
            .insert_line_item(NewLineItem {
                model_id: model.id,
                scenario_id: scenario.id,
                period_id: period.id,
                name: "Sales".into(),
                category: Category::Revenue,
                amount: Decimal::new(100_00, 2),
            })
            .await
            .unwrap();

        assert!(store.delete_model(model.id).await.unwrap());
        assert!(store.get_scenario(scenario.id).await.unwrap().is_none());
        assert!(store.get_line_item(item.id).await.unwrap().is_none());
        // Periods are global and survive
        assert!(store.get_period(period.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn line_item_requires_existing_references() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user(1)).await.unwrap();
        let model = store.insert_model(user.id, new_model()).await.unwrap();
        let result = store
            .insert_line_item(NewLineItem {
                model_id: model.id,
                scenario_id: 999,
                period_id: 999,
                name: "Sales".into(),
                category: Category::Revenue,
                amount: Decimal::ZERO,
            })
            .await;
        assert!(matches!(result, Err(DatabaseError::ForeignKeyViolation(f)) if f == "scenario_id"));
    }

    #[tokio::test]
    async fn lists_are_owner_scoped_and_paged() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user(1)).await.unwrap();
        let bob = store.insert_user(new_user(2)).await.unwrap();
        for _ in 0..3 {
            store.insert_model(alice.id, new_model()).await.unwrap();
        }
        store.insert_model(bob.id, new_model()).await.unwrap();

        let page = store.list_models(alice.id, PageRequest::new(2, 0)).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.rows.len(), 2);
        assert!(page.rows.iter().all(|m| m.user_id == alice.id));

        let rest = store.list_models(alice.id, PageRequest::new(2, 2)).await.unwrap();
        assert_eq!(rest.rows.len(), 1);
    }

    #[tokio::test]
    async fn empty_window_still_counts() {
        let store = MemoryStore::new();
        let alice = store.insert_user(new_user(1)).await.unwrap();
        for _ in 0..3 {
            store.insert_model(alice.id, new_model()).await.unwrap();
        }
        let counted = store.list_models(alice.id, PageRequest::new(0, 0)).await.unwrap();
        assert_eq!(counted.count, 3);
        assert!(counted.rows.is_empty());
    }

    #[tokio::test]
    async fn moving_a_scenario_carries_its_children() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user(1)).await.unwrap();
        let from = store.insert_model(user.id, new_model()).await.unwrap();
        let to = store.insert_model(user.id, new_model()).await.unwrap();
        let period = store.insert_period(new_period()).await.unwrap();
        let scenario = store
            .insert_scenario(NewScenario {
                model_id: from.id,
                name: "Base".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let item = store
            .insert_line_item(NewLineItem {
                model_id: from.id,
                scenario_id: scenario.id,
                period_id: period.id,
                name: "Sales".into(),
                category: Category::Revenue,
                amount: Decimal::ONE,
            })
            .await
            .unwrap();
        let assumption = store
            .insert_assumption(NewAssumption {
                model_id: from.id,
                scenario_id: scenario.id,
                name: "Growth".into(),
                value: Decimal::ONE,
                unit: "%".into(),
            })
            .await
            .unwrap();

        let changes = ScenarioChanges {
            model_id: Some(to.id),
            ..Default::default()
        };
        store.update_scenario(scenario.id, changes).await.unwrap();

        let item = store.get_line_item(item.id).await.unwrap().unwrap();
        assert_eq!(item.model_id, to.id);
        let assumption = store.get_assumption(assumption.id).await.unwrap().unwrap();
        assert_eq!(assumption.model_id, to.id);

        // The old model no longer owns anything under the scenario
        assert!(store.delete_model(from.id).await.unwrap());
        assert!(store.get_line_item(item.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn period_filter_bounds_are_inclusive() {
        let store = MemoryStore::new();
        store.insert_period(new_period()).await.unwrap();
        let filter = PeriodFilter {
            period_type: Some(PeriodType::Quarterly),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
        };
        assert_eq!(store.list_periods(&filter, PageRequest::new(100, 0)).await.unwrap().count, 1);

        let later = PeriodFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 2),
            ..Default::default()
        };
        assert_eq!(store.list_periods(&later, PageRequest::new(100, 0)).await.unwrap().count, 0);
    }
}
