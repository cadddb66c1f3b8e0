use axum::extract::State;
use serde::Serialize;
use serde_json::Value;

use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::{AuthService, UserProfile};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: UserProfile,
}

/// POST /register/ - create an account
///
/// Expects `username`, `email`, `password`, `first_name`, `last_name`,
/// `company_name` and `phone_number`. Responds 201 with the new profile.
pub async fn register_post(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<RegisterResponse> {
    let user = AuthService::new(&state).register(&body).await?;
    Ok(ApiResponse::created(RegisterResponse {
        message: "User created successfully",
        user: UserProfile::from(&user),
    }))
}
