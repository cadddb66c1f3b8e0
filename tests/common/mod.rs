#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use finmodel_api::auth::TokenService;
use finmodel_api::config::{AppConfig, StoreBackend};
use finmodel_api::database::{MemoryStore, Store};
use finmodel_api::AppState;

pub const PASSWORD: &str = "S3cure-pass!";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: Client,
}

/// Test configuration: in-memory store, fixed secret, small pages
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.backend = StoreBackend::Memory;
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.api.enable_request_logging = false;
    config
}

impl TestServer {
    /// Start the app in process on a free port against a fresh in-memory store
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(test_config(), Arc::new(MemoryStore::new())).await
    }

    pub async fn spawn_with(config: AppConfig, store: Arc<dyn Store>) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let tokens = TokenService::from_config(&config.security)?;
        let app = finmodel_api::app(AppState::new(store, tokens, config));

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            client: Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.client.get(self.url(path)).bearer_auth(token).send().await?)
    }

    pub async fn post(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        Ok(self.client.post(self.url(path)).bearer_auth(token).json(body).send().await?)
    }

    pub async fn put(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        Ok(self.client.put(self.url(path)).bearer_auth(token).json(body).send().await?)
    }

    pub async fn patch(&self, path: &str, token: &str, body: &Value) -> Result<Response> {
        Ok(self.client.patch(self.url(path)).bearer_auth(token).json(body).send().await?)
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<Response> {
        Ok(self.client.delete(self.url(path)).bearer_auth(token).send().await?)
    }

    pub async fn post_public(&self, path: &str, body: &Value) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    /// Register `name` with unique email/phone derived from `seq`
    pub async fn register(&self, name: &str, seq: u32) -> Result<Response> {
        self.post_public("/register/", &registration(name, seq)).await
    }

    /// Log in and return `{access, refresh}`
    pub async fn login(&self, email: &str, password: &str) -> Result<Value> {
        let res = self
            .post_public("/login/", &json!({"email": email, "password": password}))
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        Ok(res.json().await?)
    }

    /// Register a fresh user and return their access token
    pub async fn user(&self, name: &str, seq: u32) -> Result<String> {
        let res = self.register(name, seq).await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "register failed: {}", res.status());
        let tokens = self.login(&email_for(name), PASSWORD).await?;
        Ok(tokens["access"].as_str().context("missing access token")?.to_string())
    }

    /// Create a resource and return its JSON, asserting 201
    pub async fn create(&self, path: &str, token: &str, body: Value) -> Result<Value> {
        let res = self.post(path, token, &body).await?;
        let status = res.status();
        let json: Value = res.json().await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create {} failed: {} {}", path, status, json);
        Ok(json)
    }

    pub async fn model(&self, token: &str, name: &str) -> Result<Value> {
        self.create(
            "/finance-model/",
            token,
            json!({"name": name, "version": "1.0", "model_type": "Forecast"}),
        )
        .await
    }

    pub async fn scenario(&self, token: &str, model_id: i64, name: &str) -> Result<Value> {
        self.create(
            "/scenario/",
            token,
            json!({"model_id": model_id, "name": name, "description": ""}),
        )
        .await
    }

    pub async fn period(&self, token: &str, label: &str, start: &str, end: &str, kind: &str) -> Result<Value> {
        self.create(
            "/period/",
            token,
            json!({"label": label, "start_date": start, "end_date": end, "period_type": kind}),
        )
        .await
    }
}

pub fn email_for(name: &str) -> String {
    format!("{}@example.com", name)
}

pub fn registration(name: &str, seq: u32) -> Value {
    json!({
        "username": name,
        "email": email_for(name),
        "password": PASSWORD,
        "first_name": "Test",
        "last_name": "User",
        "company_name": "Acme Ltd",
        "phone_number": format!("555{:07}", seq),
    })
}

pub fn id_of(value: &Value) -> i64 {
    value["id"].as_i64().expect("response has an integer id")
}
