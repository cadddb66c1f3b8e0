use axum::extract::State;
use serde_json::Value;

use crate::auth::TokenPair;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::services::AuthService;
use crate::state::AppState;

/// POST /token/refresh/ - trade `{refresh}` for a fresh pair
pub async fn refresh_post(State(state): State<AppState>, ApiJson(body): ApiJson<Value>) -> ApiResult<TokenPair> {
    let pair = AuthService::new(&state).refresh(&body).await?;
    Ok(ApiResponse::success(pair))
}
