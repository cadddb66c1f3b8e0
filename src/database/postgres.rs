use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, PgPool, Postgres, QueryBuilder};

use super::models::{
    Assumption, AssumptionChanges, AssumptionFilter, FinancialModel, FinancialModelChanges, LineItem,
    LineItemChanges, LineItemFilter, NewAssumption, NewFinancialModel, NewLineItem, NewPeriod, NewScenario,
    NewUser, Period, PeriodFilter, ProfileChanges, Scenario, ScenarioChanges, ScenarioFilter, User,
};
use super::store::{Listing, PageRequest, Store};
use super::{DatabaseError, DatabaseManager};

/// `Store` backed by the Postgres schema in `migrations/`
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Count and fetch one page from `from`, applying the same filters to both queries.
    /// `from` must alias the listed table as `t`.
    async fn fetch_page<T, F>(&self, from: &str, filters: F, page: PageRequest) -> Result<Listing<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
        F: Fn(&mut QueryBuilder<'_, Postgres>),
    {
        let mut count_query = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE TRUE", from));
        filters(&mut count_query);
        let (count,) = count_query
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::new(format!("SELECT t.* FROM {} WHERE TRUE", from));
        filters(&mut query);
        query.push(" ORDER BY t.id LIMIT ");
        query.push_bind(page.limit);
        query.push(" OFFSET ");
        query.push_bind(page.offset);
        let rows = query.build_query_as::<T>().fetch_all(&self.pool).await?;

        Ok(Listing { rows, count })
    }
}

const OWNED_SCENARIOS: &str = "scenarios t JOIN financial_models m ON m.id = t.model_id";
const OWNED_LINE_ITEMS: &str = "line_items t JOIN financial_models m ON m.id = t.model_id";
const OWNED_ASSUMPTIONS: &str = "assumptions t JOIN financial_models m ON m.id = t.model_id";

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let row = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, first_name, last_name, company_name, phone_number) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.company_name)
        .bind(user.phone_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn taken_user_fields(
        &self,
        username: &str,
        email: &str,
        phone_number: &str,
    ) -> Result<Vec<&'static str>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT username, email, phone_number FROM users \
             WHERE username = $1 OR email = $2 OR phone_number = $3",
        )
        .bind(username)
        .bind(email)
        .bind(phone_number)
        .fetch_all(&self.pool)
        .await?;

        let mut taken = Vec::new();
        if rows.iter().any(|(u, _, _)| u == username) {
            taken.push("username");
        }
        if rows.iter().any(|(_, e, _)| e == email) {
            taken.push("email");
        }
        if rows.iter().any(|(_, _, p)| p == phone_number) {
            taken.push("phone_number");
        }
        Ok(taken)
    }

    async fn update_profile(&self, id: i64, changes: ProfileChanges) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, User>(
            "UPDATE users SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                company_name = COALESCE($4, company_name) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.company_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_models(&self, owner: i64, page: PageRequest) -> Result<Listing<FinancialModel>, DatabaseError> {
        self.fetch_page(
            "financial_models t",
            |q| {
                q.push(" AND t.user_id = ").push_bind(owner);
            },
            page,
        )
        .await
    }

    async fn get_model(&self, id: i64) -> Result<Option<FinancialModel>, DatabaseError> {
        let row = sqlx::query_as::<_, FinancialModel>("SELECT * FROM financial_models WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_model(&self, owner: i64, model: NewFinancialModel) -> Result<FinancialModel, DatabaseError> {
        let row = sqlx::query_as::<_, FinancialModel>(
            "INSERT INTO financial_models (user_id, name, version, model_type) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(owner)
        .bind(model.name)
        .bind(model.version)
        .bind(model.model_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_model(
        &self,
        id: i64,
        changes: FinancialModelChanges,
    ) -> Result<Option<FinancialModel>, DatabaseError> {
        let row = sqlx::query_as::<_, FinancialModel>(
            "UPDATE financial_models SET \
                name = COALESCE($2, name), \
                version = COALESCE($3, version), \
                model_type = COALESCE($4, model_type) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.version)
        .bind(changes.model_type.map(|t| t.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_model(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM financial_models WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_periods(&self, filter: &PeriodFilter, page: PageRequest) -> Result<Listing<Period>, DatabaseError> {
        let filter = filter.clone();
        self.fetch_page(
            "periods t",
            move |q| {
                if let Some(t) = filter.period_type {
                    q.push(" AND t.period_type = ").push_bind(t.as_str());
                }
                if let Some(d) = filter.start_date {
                    q.push(" AND t.start_date >= ").push_bind(d);
                }
                if let Some(d) = filter.end_date {
                    q.push(" AND t.end_date <= ").push_bind(d);
                }
            },
            page,
        )
        .await
    }

    async fn get_period(&self, id: i64) -> Result<Option<Period>, DatabaseError> {
        let row = sqlx::query_as::<_, Period>("SELECT * FROM periods WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_period(&self, period: NewPeriod) -> Result<Period, DatabaseError> {
        let row = sqlx::query_as::<_, Period>(
            "INSERT INTO periods (label, start_date, end_date, period_type) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(period.label)
        .bind(period.start_date)
        .bind(period.end_date)
        .bind(period.period_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_scenarios(
        &self,
        owner: i64,
        filter: &ScenarioFilter,
        page: PageRequest,
    ) -> Result<Listing<Scenario>, DatabaseError> {
        let filter = filter.clone();
        self.fetch_page(
            OWNED_SCENARIOS,
            move |q| {
                q.push(" AND m.user_id = ").push_bind(owner);
                if let Some(id) = filter.model_id {
                    q.push(" AND t.model_id = ").push_bind(id);
                }
            },
            page,
        )
        .await
    }

    async fn get_scenario(&self, id: i64) -> Result<Option<Scenario>, DatabaseError> {
        let row = sqlx::query_as::<_, Scenario>("SELECT * FROM scenarios WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_scenario(&self, scenario: NewScenario) -> Result<Scenario, DatabaseError> {
        let row = sqlx::query_as::<_, Scenario>(
            "INSERT INTO scenarios (model_id, name, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(scenario.model_id)
        .bind(scenario.name)
        .bind(scenario.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_scenario(&self, id: i64, changes: ScenarioChanges) -> Result<Option<Scenario>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, Scenario>(
            "UPDATE scenarios SET \
                model_id = COALESCE($2, model_id), \
                name = COALESCE($3, name), \
                description = COALESCE($4, description) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.model_id)
        .bind(changes.name)
        .bind(changes.description)
        .fetch_optional(&mut *tx)
        .await?;

        // Children follow their scenario to its new model
        if let (Some(scenario), Some(_)) = (&row, changes.model_id) {
            for table in ["line_items", "assumptions"] {
                sqlx::query(&format!("UPDATE {} SET model_id = $1 WHERE scenario_id = $2", table))
                    .bind(scenario.model_id)
                    .bind(scenario.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(row)
    }

    async fn delete_scenario(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM scenarios WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_line_items(
        &self,
        owner: i64,
        filter: &LineItemFilter,
        page: PageRequest,
    ) -> Result<Listing<LineItem>, DatabaseError> {
        let filter = filter.clone();
        self.fetch_page(
            OWNED_LINE_ITEMS,
            move |q| {
                q.push(" AND m.user_id = ").push_bind(owner);
                if let Some(id) = filter.model_id {
                    q.push(" AND t.model_id = ").push_bind(id);
                }
                if let Some(id) = filter.scenario_id {
                    q.push(" AND t.scenario_id = ").push_bind(id);
                }
                if let Some(id) = filter.period_id {
                    q.push(" AND t.period_id = ").push_bind(id);
                }
            },
            page,
        )
        .await
    }

    async fn get_line_item(&self, id: i64) -> Result<Option<LineItem>, DatabaseError> {
        let row = sqlx::query_as::<_, LineItem>("SELECT * FROM line_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_line_item(&self, item: NewLineItem) -> Result<LineItem, DatabaseError> {
        let row = sqlx::query_as::<_, LineItem>(
            "INSERT INTO line_items (model_id, scenario_id, period_id, name, category, amount) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(item.model_id)
        .bind(item.scenario_id)
        .bind(item.period_id)
        .bind(item.name)
        .bind(item.category.as_str())
        .bind(item.amount)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_line_item(&self, id: i64, changes: LineItemChanges) -> Result<Option<LineItem>, DatabaseError> {
        let row = sqlx::query_as::<_, LineItem>(
            "UPDATE line_items SET \
                model_id = COALESCE($2, model_id), \
                scenario_id = COALESCE($3, scenario_id), \
                period_id = COALESCE($4, period_id), \
                name = COALESCE($5, name), \
                category = COALESCE($6, category), \
                amount = COALESCE($7, amount) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.model_id)
        .bind(changes.scenario_id)
        .bind(changes.period_id)
        .bind(changes.name)
        .bind(changes.category.map(|c| c.as_str()))
        .bind(changes.amount)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_line_item(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM line_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_assumptions(
        &self,
        owner: i64,
        filter: &AssumptionFilter,
        page: PageRequest,
    ) -> Result<Listing<Assumption>, DatabaseError> {
        let filter = filter.clone();
        self.fetch_page(
            OWNED_ASSUMPTIONS,
            move |q| {
                q.push(" AND m.user_id = ").push_bind(owner);
                if let Some(id) = filter.model_id {
                    q.push(" AND t.model_id = ").push_bind(id);
                }
                if let Some(id) = filter.scenario_id {
                    q.push(" AND t.scenario_id = ").push_bind(id);
                }
            },
            page,
        )
        .await
    }

    async fn get_assumption(&self, id: i64) -> Result<Option<Assumption>, DatabaseError> {
        let row = sqlx::query_as::<_, Assumption>("SELECT * FROM assumptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_assumption(&self, assumption: NewAssumption) -> Result<Assumption, DatabaseError> {
        let row = sqlx::query_as::<_, Assumption>(
            "INSERT INTO assumptions (model_id, scenario_id, name, value, unit) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(assumption.model_id)
        .bind(assumption.scenario_id)
        .bind(assumption.name)
        .bind(assumption.value)
        .bind(assumption.unit)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_assumption(
        &self,
        id: i64,
        changes: AssumptionChanges,
    ) -> Result<Option<Assumption>, DatabaseError> {
        let row = sqlx::query_as::<_, Assumption>(
            "UPDATE assumptions SET \
                model_id = COALESCE($2, model_id), \
                scenario_id = COALESCE($3, scenario_id), \
                name = COALESCE($4, name), \
                value = COALESCE($5, value), \
                unit = COALESCE($6, unit) \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(changes.model_id)
        .bind(changes.scenario_id)
        .bind(changes.name)
        .bind(changes.value)
        .bind(changes.unit)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_assumption(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM assumptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
