use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    /// Unique constraint hit; carries the offending field name
    #[error("Duplicate value for {0}")]
    UniqueViolation(String),

    /// Foreign key target missing; carries the referencing field name
    #[error("Missing reference for {0}")]
    ForeignKeyViolation(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

/// Constraint name to the request field it guards
const CONSTRAINT_FIELDS: &[(&str, &str)] = &[
    ("users_username_key", "username"),
    ("users_email_key", "email"),
    ("users_phone_number_key", "phone_number"),
    ("financial_models_user_id_fkey", "user_id"),
    ("scenarios_model_id_fkey", "model_id"),
    ("line_items_model_id_fkey", "model_id"),
    ("line_items_scenario_id_fkey", "scenario_id"),
    ("line_items_period_id_fkey", "period_id"),
    ("assumptions_model_id_fkey", "model_id"),
    ("assumptions_scenario_id_fkey", "scenario_id"),
];

fn constraint_field(constraint: Option<&str>) -> String {
    constraint
        .and_then(|name| CONSTRAINT_FIELDS.iter().find(|(c, _)| *c == name))
        .map(|(_, field)| field.to_string())
        .unwrap_or_else(|| "non_field_errors".to_string())
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => DatabaseError::UniqueViolation(constraint_field(db.constraint())),
                Some("23503") => DatabaseError::ForeignKeyViolation(constraint_field(db.constraint())),
                _ => DatabaseError::Sqlx(err),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::Sqlx(err),
        }
    }
}

/// Builds and prepares the Postgres pool the service runs on
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a pool against `DATABASE_URL` using the configured limits
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected to database at {}", Self::redact_url(url));
        Ok(pool)
    }

    /// Apply the embedded migrations
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Strip the password from a connection URL before it reaches the logs
    pub fn redact_url(raw: &str) -> String {
        match url::Url::parse(raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("****"));
                }
                url.to_string()
            }
            Err(_) => "<invalid url>".to_string(),
        }
    }
}
