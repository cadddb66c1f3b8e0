use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::api::params;
use crate::auth::{hash_password, verify_password, AuthError, TokenKind, TokenPair, TokenService};
use crate::database::models::{NewUser, ProfileChanges, User};
use crate::database::Store;
use crate::error::{ApiError, FieldErrors};
use crate::state::AppState;

const USERNAME_MAX: usize = 150;
const EMAIL_MAX: usize = 254;
const NAME_MAX: usize = 225;
const PHONE_MAX: usize = 11;

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

/// Public view of a user; the password hash never leaves the store
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            company_name: user.company_name.clone(),
            phone_number: user.phone_number.clone(),
            created_at: user.created_at,
        }
    }
}

/// Registration, credential checks and self-service profile edits
pub struct AuthService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenService,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            store: state.store.as_ref(),
            tokens: state.tokens.as_ref(),
        }
    }

    /// Validate and create an account. Every problem, including values already
    /// taken by another account, is reported per field.
    pub async fn register(&self, body: &Value) -> Result<User, ApiError> {
        let mut errors = FieldErrors::new();

        let username = params::string(&mut errors, body, "username");
        let email = params::string(&mut errors, body, "email").map(|e| normalize_email(&e));
        let password = params::string(&mut errors, body, "password");
        let first_name = params::string(&mut errors, body, "first_name");
        let last_name = params::string(&mut errors, body, "last_name");
        let company_name = params::string(&mut errors, body, "company_name");
        let phone_number = params::string(&mut errors, body, "phone_number");

        errors.text("username", username.as_deref(), USERNAME_MAX);
        errors.text("email", email.as_deref(), EMAIL_MAX);
        if let Some(e) = email.as_deref() {
            if !e.is_empty() && !is_valid_email(e) {
                errors.add("email", "Enter a valid email address.");
            }
        }
        match password.as_deref() {
            None => errors.add("password", "This field is required."),
            Some(p) if p.is_empty() => errors.add("password", "This field may not be blank."),
            Some(_) => {}
        }
        errors.text("first_name", first_name.as_deref(), NAME_MAX);
        errors.text("last_name", last_name.as_deref(), NAME_MAX);
        errors.text("company_name", company_name.as_deref(), NAME_MAX);
        errors.text("phone_number", phone_number.as_deref(), PHONE_MAX);

        if let (Some(u), Some(e), Some(p)) = (username.as_deref(), email.as_deref(), phone_number.as_deref()) {
            for field in self.store.taken_user_fields(u, e, p).await? {
                errors.add(field, already_taken(field));
            }
        }

        errors.into_result()?;

        let (Some(username), Some(email), Some(password), Some(first_name), Some(last_name), Some(company_name), Some(phone_number)) =
            (username, email, password, first_name, last_name, company_name, phone_number)
        else {
            return Err(ApiError::internal_server_error("Validation passed with missing fields"));
        };

        let password_hash = hash_blocking(password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                username,
                email,
                password_hash,
                first_name,
                last_name,
                company_name,
                phone_number,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "Registered user");
        Ok(user)
    }

    /// Exchange email and password for a token pair.
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, body: &Value) -> Result<TokenPair, ApiError> {
        let mut errors = FieldErrors::new();
        let email = params::string(&mut errors, body, "email");
        let password = params::string(&mut errors, body, "password");
        errors.text("email", email.as_deref(), EMAIL_MAX);
        if password.is_none() {
            errors.add("password", "This field is required.");
        }
        errors.into_result()?;

        let email = normalize_email(email.as_deref().unwrap_or_default());
        let password = password.unwrap_or_default();

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            tracing::info!("Login failed: unknown email");
            return Err(ApiError::unauthorized(BAD_CREDENTIALS));
        };

        if !verify_blocking(password, user.password_hash.clone()).await? {
            tracing::info!(user_id = user.id, "Login failed: wrong password");
            return Err(ApiError::unauthorized(BAD_CREDENTIALS));
        }

        tracing::info!(user_id = user.id, "Login succeeded");
        Ok(self.tokens.issue_pair(user.id, &user.username)?)
    }

    /// Verify a refresh token and rotate the pair
    pub async fn refresh(&self, body: &Value) -> Result<TokenPair, ApiError> {
        let mut errors = FieldErrors::new();
        let token = params::string(&mut errors, body, "refresh");
        errors.text("refresh", token.as_deref(), usize::MAX);
        errors.into_result()?;

        let claims = self
            .tokens
            .verify(token.as_deref().unwrap_or_default(), TokenKind::Refresh)?;

        let Some(user) = self.store.find_user_by_id(claims.user_id).await? else {
            tracing::info!(user_id = claims.user_id, "Refresh for a user that no longer exists");
            return Err(ApiError::unauthorized("User not found"));
        };

        Ok(self.tokens.issue_pair(user.id, &user.username)?)
    }

    pub async fn profile(&self, user_id: i64) -> Result<User, ApiError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))
    }

    /// Apply first/last/company name changes; any other key is ignored
    pub async fn update_profile(&self, user_id: i64, body: &Value) -> Result<User, ApiError> {
        let mut errors = FieldErrors::new();
        let changes = ProfileChanges {
            first_name: params::string(&mut errors, body, "first_name"),
            last_name: params::string(&mut errors, body, "last_name"),
            company_name: params::string(&mut errors, body, "company_name"),
        };
        errors.optional_text("first_name", changes.first_name.as_deref(), NAME_MAX);
        errors.optional_text("last_name", changes.last_name.as_deref(), NAME_MAX);
        errors.optional_text("company_name", changes.company_name.as_deref(), NAME_MAX);
        errors.into_result()?;

        let user = self
            .store
            .update_profile(user_id, changes)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        tracing::info!(user_id, "Profile updated");
        Ok(user)
    }
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn already_taken(field: &str) -> String {
    let label = match field {
        "username" => "username",
        "email" => "email",
        _ => "phone number",
    };
    format!("A user with that {} already exists.", label)
}

/// Structural check only: one `@`, a non-empty local part, a dotted domain
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

// argon2 is deliberately slow; keep it off the async workers
async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .map_err(ApiError::from)
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::PasswordHash(e.to_string()))?
        .map_err(ApiError::from)
}
