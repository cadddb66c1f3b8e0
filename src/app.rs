use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::handlers;
use crate::middleware::require_access_token;
use crate::state::AppState;

/// Full HTTP surface of the service
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(profile_routes())
        .merge(finance_model_routes())
        .merge(period_routes())
        .merge(scenario_routes())
        .merge(line_item_routes())
        .merge(assumption_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_access_token));

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(state.config.api.max_request_size_bytes))
                .layer(cors_layer(&state.config.security.cors_origins))
                .layer(DefaultBodyLimit::disable()),
        );

    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(AllowOrigin::any());
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(parsed))
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/register/", post(auth::register_post))
        .route("/login/", post(auth::login_post))
        .route("/token/refresh/", post(auth::refresh_post))
}

fn profile_routes() -> Router<AppState> {
    use handlers::protected::profile;

    Router::new()
        .route("/profile/", get(profile::profile_get))
        .route("/profile/update", put(profile::profile_update).patch(profile::profile_update))
}

fn finance_model_routes() -> Router<AppState> {
    use handlers::protected::finance_model;

    Router::new()
        .route("/finance-model/", get(finance_model::list).post(finance_model::create))
        .route(
            "/finance-model/:id/",
            get(finance_model::retrieve)
                .put(finance_model::replace)
                .patch(finance_model::patch)
                .delete(finance_model::destroy),
        )
}

fn period_routes() -> Router<AppState> {
    use handlers::protected::period;

    // Periods are read-only once created
    Router::new()
        .route("/period/", get(period::list).post(period::create))
        .route("/period/:id/", get(period::retrieve))
}

fn scenario_routes() -> Router<AppState> {
    use handlers::protected::scenario;

    Router::new()
        .route("/scenario/", get(scenario::list).post(scenario::create))
        .route(
            "/scenario/:id/",
            get(scenario::retrieve)
                .put(scenario::replace)
                .patch(scenario::patch)
                .delete(scenario::destroy),
        )
}

fn line_item_routes() -> Router<AppState> {
    use handlers::protected::line_item;

    Router::new()
        .route("/line-item/", get(line_item::list).post(line_item::create))
        .route(
            "/line-item/:id/",
            get(line_item::retrieve)
                .put(line_item::replace)
                .patch(line_item::patch)
                .delete(line_item::destroy),
        )
}

fn assumption_routes() -> Router<AppState> {
    use handlers::protected::assumption;

    Router::new()
        .route("/assumption/", get(assumption::list).post(assumption::create))
        .route(
            "/assumption/:id/",
            get(assumption::retrieve)
                .put(assumption::replace)
                .patch(assumption::patch)
                .delete(assumption::destroy),
        )
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "name": "finmodel-api",
        "version": version,
        "description": "REST backend for user-owned financial models",
        "endpoints": {
            "auth": "/register/, /login/, /token/refresh/ (public)",
            "profile": "/profile/, /profile/update (bearer)",
            "finance_model": "/finance-model/[:id/] (bearer)",
            "period": "/period/[:id/] (bearer)",
            "scenario": "/scenario/[:id/] (bearer)",
            "line_item": "/line-item/[:id/] (bearer)",
            "assumption": "/assumption/[:id/] (bearer)",
            "health": "/health (public)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
