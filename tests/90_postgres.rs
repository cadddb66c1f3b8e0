//! Runs the HTTP surface against a real database when TEST_DATABASE_URL is set.

mod common;

use anyhow::Result;
use rand::Rng;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use common::{id_of, test_config, TestServer};
use finmodel_api::config::StoreBackend;
use finmodel_api::database::{DatabaseManager, PgStore};

async fn postgres_server() -> Result<Option<TestServer>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return Ok(None);
    };

    let mut config = test_config();
    config.database.backend = StoreBackend::Postgres;
    config.database.url = Some(url);
    config.database.max_connections = 2;

    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;
    let server = TestServer::spawn_with(config, Arc::new(PgStore::new(pool))).await?;
    Ok(Some(server))
}

#[tokio::test]
async fn postgres_round_trip() -> Result<()> {
    let Some(server) = postgres_server().await? else {
        return Ok(());
    };

    // The database outlives the test, so names must not collide between runs
    let seq: u32 = rand::thread_rng().gen_range(0..10_000_000);
    let name = format!("pg{}", seq);
    let token = server.user(&name, seq).await?;

    let res = server.register(&name, seq).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field_errors"]["username"], "A user with that username already exists.");

    let model = id_of(&server.model(&token, "Plan").await?);
    let scenario = id_of(&server.scenario(&token, model, "Base").await?);
    let period = id_of(
        &server
            .period(&token, &format!("Jan {}", seq), "2025-01-01", "2025-01-31", "monthly")
            .await?,
    );

    let item = server
        .create(
            "/line-item/",
            &token,
            json!({
                "model_id": model, "scenario_id": scenario, "period_id": period,
                "name": "Sales", "category": "Revenue", "amount": "1500.5",
            }),
        )
        .await?;
    assert_eq!(item["amount"], "1500.50");
    assert_eq!(item["period"]["period_type"], "monthly");

    let res = server
        .get(&format!("/line-item/?model_id={}", model), &token)
        .await?;
    let page: Value = res.json().await?;
    assert_eq!(page["count"], 1);

    let res = server.delete(&format!("/finance-model/{}/", model), &token).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = server.get(&format!("/line-item/{}/", id_of(&item)), &token).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
