mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{email_for, registration, test_config, TestServer, PASSWORD};
use finmodel_api::database::MemoryStore;
use std::sync::Arc;

#[tokio::test]
async fn register_returns_created_profile() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.register("alice", 1).await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body: Value = res.json().await?;
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn register_reports_missing_and_taken_fields() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("alice", 1).await?;

    let res = server.post_public("/register/", &json!({"username": "bob"})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field_errors"]["email"], "This field is required.");
    assert_eq!(body["field_errors"]["phone_number"], "This field is required.");

    // Same email in a different case, same phone
    let mut duplicate = registration("alice2", 1);
    duplicate["email"] = json!("ALICE@example.com");
    let res = server.post_public("/register/", &duplicate).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field_errors"]["email"], "A user with that email already exists.");
    assert_eq!(
        body["field_errors"]["phone_number"],
        "A user with that phone number already exists."
    );
    assert!(body["field_errors"].get("username").is_none());
    Ok(())
}

#[tokio::test]
async fn rejected_registration_is_not_stored() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("alice", 1).await?;

    // Taken username, everything else fresh
    let mut duplicate = registration("carol", 3);
    duplicate["username"] = json!("alice");
    let res = server.post_public("/register/", &duplicate).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["field_errors"]["username"], "A user with that username already exists.");

    let res = server
        .post_public("/login/", &json!({"email": email_for("carol"), "password": PASSWORD}))
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // The original account is untouched
    server.login(&email_for("alice"), PASSWORD).await?;
    Ok(())
}

#[tokio::test]
async fn login_issues_token_pair() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("alice", 1).await?;

    let tokens = server.login(&email_for("alice"), PASSWORD).await?;
    assert!(tokens["access"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(tokens["refresh"].as_str().is_some_and(|t| !t.is_empty()));
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("alice", 1).await?;

    let wrong_password = server
        .post_public("/login/", &json!({"email": "alice@example.com", "password": "nope"}))
        .await?;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json().await?;

    let unknown = server
        .post_public("/login/", &json!({"email": "nobody@example.com", "password": "nope"}))
        .await?;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let b: Value = unknown.json().await?;

    assert_eq!(a["message"], b["message"]);
    assert_eq!(a["message"], "No active account found with the given credentials");
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_rejects_access_tokens() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("alice", 1).await?;
    let tokens = server.login(&email_for("alice"), PASSWORD).await?;

    let res = server
        .post_public("/token/refresh/", &json!({"refresh": tokens["refresh"]}))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let rotated: Value = res.json().await?;
    let access = rotated["access"].as_str().unwrap_or_default();
    assert!(!access.is_empty());

    let res = server.get("/profile/", access).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .post_public("/token/refresh/", &json!({"refresh": tokens["access"]}))
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.post_public("/token/refresh/", &json!({})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_access_token() -> Result<()> {
    let server = TestServer::spawn().await?;
    server.register("alice", 1).await?;
    let tokens = server.login(&email_for("alice"), PASSWORD).await?;

    let res = server.client.get(server.url("/finance-model/")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server.get("/finance-model/", "not-a-token").await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let refresh = tokens["refresh"].as_str().unwrap_or_default();
    let res = server.get("/finance-model/", refresh).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn profile_update_changes_only_names() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = server.user("alice", 1).await?;

    let res = server.get("/profile/", &token).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let profile: Value = res.json().await?;
    assert_eq!(profile["company_name"], "Acme Ltd");

    let res = server
        .patch(
            "/profile/update",
            &token,
            &json!({"company_name": "Globex", "email": "hijack@example.com", "username": "mallory"}),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await?;
    assert_eq!(updated["company_name"], "Globex");
    assert_eq!(updated["first_name"], "Test");
    assert_eq!(updated["email"], "alice@example.com");
    assert_eq!(updated["username"], "alice");

    let res = server.put("/profile/update", &token, &json!({"last_name": "Smith"})).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await?;
    assert_eq!(updated["last_name"], "Smith");
    assert_eq!(updated["company_name"], "Globex");
    Ok(())
}

#[tokio::test]
async fn health_and_root_are_public() -> Result<()> {
    let server = TestServer::spawn().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");

    let res = server.client.get(server.url("/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["name"], "finmodel-api");
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_rejected() -> Result<()> {
    let mut config = test_config();
    config.api.max_request_size_bytes = 1024;
    let server = TestServer::spawn_with(config, Arc::new(MemoryStore::new())).await?;

    let mut body = registration("alice", 1);
    body["company_name"] = json!("x".repeat(4096));
    let res = server.post_public("/register/", &body).await?;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // Nothing was created
    let res = server.register("alice", 1).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn cors_allows_configured_origin() -> Result<()> {
    let server = TestServer::spawn().await?;
    let origin = test_config().security.cors_origins[0].clone();

    let res = server
        .client
        .get(server.url("/health"))
        .header("Origin", &origin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let allowed = res
        .headers()
        .get("access-control-allow-origin")
        .and_then(|v| v.to_str().ok());
    assert_eq!(allowed, Some(origin.as_str()));
    Ok(())
}
