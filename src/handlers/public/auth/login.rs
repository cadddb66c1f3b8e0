use axum::extract::State;
use serde_json::Value;

use crate::auth::TokenPair;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::AuthService;
use crate::state::AppState;

/// POST /login/ - exchange `email` and `password` for `{access, refresh}`
pub async fn login_post(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<TokenPair> {
    let pair = AuthService::new(&state).login(&body).await?;
    Ok(ApiResponse::success(pair))
}
