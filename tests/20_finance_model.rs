mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{id_of, test_config, TestServer};
use finmodel_api::database::MemoryStore;
use std::sync::Arc;

#[tokio::test]
async fn crud_lifecycle() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.user("alice", 1).await?;

    let model = server.model(&token, "Budget 2025").await?;
    let id = id_of(&model);
    assert_eq!(model["name"], "Budget 2025");
    assert_eq!(model["model_type"], "Forecast");
    assert!(model.get("user_id").is_none());
    assert!(model["created_at"].is_string());

    let res = server.get(&format!("/finance-model/{}/", id), &token).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .patch(&format!("/finance-model/{}/", id), &token, &json!({"version": "2.0"}))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let patched: Value = res.json().await?;
    assert_eq!(patched["version"], "2.0");
    assert_eq!(patched["name"], "Budget 2025");
    assert_eq!(patched["created_at"], model["created_at"]);

    // PUT needs the full representation
    let res = server
        .put(&format!("/finance-model/{}/", id), &token, &json!({"name": "Renamed"}))
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field_errors"]["model_type"], "This field is required.");

    let res = server
        .put(
            &format!("/finance-model/{}/", id),
            &token,
            &json!({"name": "Renamed", "version": "3.0", "model_type": "Budget"}),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let replaced: Value = res.json().await?;
    assert_eq!(replaced["model_type"], "Budget");

    let res = server.delete(&format!("/finance-model/{}/", id), &token).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.get(&format!("/finance-model/{}/", id), &token).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn create_validates_fields() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.user("alice", 1).await?;

    let res = server
        .post(
            "/finance-model/",
            &token,
            &json!({"name": "", "version": "1", "model_type": "Guess"}),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field_errors"]["name"], "This field may not be blank.");
    assert_eq!(body["field_errors"]["model_type"], "\"Guess\" is not a valid choice.");
    Ok(())
}

#[tokio::test]
async fn models_are_private_to_their_owner() -> Result<()> {
    let server = TestServer::spawn().await?;
    let alice = server.user("alice", 1).await?;
    let bob = server.user("bob", 2).await?;

    let model = server.model(&alice, "Alice's plan").await?;
    let path = format!("/finance-model/{}/", id_of(&model));

    let res = server.get(&path, &bob).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = server.patch(&path, &bob, &json!({"name": "mine"})).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = server.delete(&path, &bob).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Rejected writes changed nothing
    let res = server.get(&path, &alice).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let unchanged: Value = res.json().await?;
    assert_eq!(unchanged, model);

    let res = server.get("/finance-model/", &bob).await?;
    let listing: Value = res.json().await?;
    assert_eq!(listing["count"], 0);

    let res = server.get("/finance-model/999/", &alice).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = server.get("/finance-model/abc/", &alice).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn list_is_paginated() -> Result<()> {
    let mut config = test_config();
    config.api.page_size = 2;
    let server = TestServer::spawn_with(config, Arc::new(MemoryStore::new())).await?;
    let token = server.user("alice", 1).await?;

    for n in 0..5 {
        server.model(&token, &format!("Model {}", n)).await?;
    }

    let res = server.get("/finance-model/", &token).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let first: Value = res.json().await?;
    assert_eq!(first["count"], 5);
    assert_eq!(first["results"].as_array().map(Vec::len), Some(2));
    assert!(first["previous"].is_null());
    assert!(first["next"].as_str().is_some_and(|n| n.contains("page=2")));
    assert_eq!(first["results"][0]["name"], "Model 0");

    let res = server.get("/finance-model/?page=last", &token).await?;
    let last: Value = res.json().await?;
    assert_eq!(last["results"].as_array().map(Vec::len), Some(1));
    assert!(last["next"].is_null());
    assert!(last["previous"].as_str().is_some_and(|p| p.contains("page=2")));

    let res = server.get("/finance-model/?page=4", &token).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Invalid page.");
    Ok(())
}

#[tokio::test]
async fn deleting_model_cascades() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.user("alice", 1).await?;
    let model = id_of(&server.model(&token, "Plan").await?);
    let keep = id_of(&server.model(&token, "Keep").await?);
    let scenario = id_of(&server.scenario(&token, model, "Base").await?);
    let kept_scenario = id_of(&server.scenario(&token, keep, "Base").await?);
    let period = id_of(&server.period(&token, "Jan", "2025-01-01", "2025-01-31", "monthly").await?);

    let item = server
        .create(
            "/line-item/",
            &token,
            json!({
                "model_id": model, "scenario_id": scenario, "period_id": period,
                "name": "Sales", "category": "Revenue", "amount": 10,
            }),
        )
        .await?;
    let assumption = server
        .create(
            "/assumption/",
            &token,
            json!({"model_id": model, "scenario_id": scenario, "name": "Growth", "value": 2}),
        )
        .await?;

    let res = server.delete(&format!("/finance-model/{}/", model), &token).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    for path in [
        format!("/scenario/{}/", scenario),
        format!("/line-item/{}/", id_of(&item)),
        format!("/assumption/{}/", id_of(&assumption)),
    ] {
        let res = server.get(&path, &token).await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", path);
    }

    // Siblings and the shared period survive
    let res = server.get(&format!("/scenario/{}/", kept_scenario), &token).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = server.get(&format!("/period/{}/", period), &token).await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}
