// /profile/ - the caller's own account

use axum::{extract::State, Extension};
use serde_json::Value;

use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::{AuthService, UserProfile};
use crate::state::AppState;

/// GET /profile/
pub async fn profile_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<UserProfile> {
    let account = AuthService::new(&state).profile(user.user_id).await?;
    Ok(ApiResponse::success(UserProfile::from(&account)))
}

/// PUT | PATCH /profile/update - only first_name, last_name and company_name change
pub async fn profile_update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<UserProfile> {
    let account = AuthService::new(&state).update_profile(user.user_id, &body).await?;
    Ok(ApiResponse::success(UserProfile::from(&account)))
}
