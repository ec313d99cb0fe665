//! HTTP API for the swear jar node.

use crate::error::{Error, Result};
use crate::node::NodeState;
use crate::sessions::SessionTokens;
use crate::ws::ws_transactions_handler;
use axum::{
    async_trait,
    extract::{FromRequest, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use swearjar_ledger::{Jar, MutationOutcome, Transaction};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<NodeState>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health (at root and under /api/v1 for compatibility)
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/ready", get(ready))
        // Jars
        .route("/api/v1/jars", get(list_jars).post(create_jar))
        .route("/api/v1/jars/:id", get(get_jar))
        .route("/api/v1/jars/:id/transactions", get(list_transactions))
        // Balance changes
        .route("/api/v1/jars/:id/members", post(apply_member_delta))
        .route("/api/v1/jars/:id/addMember", put(add_member))
        .route("/api/v1/jars/:id/removeMember", delete(remove_member))
        // Permissions
        .route("/api/v1/jars/:id/permissions", post(grant_permission))
        .route("/api/v1/jars/:id/permissions/:user_id", delete(revoke_permission))
        // Sessions
        .route("/api/v1/sessions/refresh", post(refresh_session))
        // WebSocket for real-time transactions
        .route("/api/v1/ws/transactions", get(ws_transactions_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Authentication ---

/// Resolve the caller from an `Authorization: Bearer <token>` header.
fn authenticate(state: &NodeState, headers: &HeaderMap) -> Result<String> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| Error::Unauthorized("malformed Authorization header".into()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Unauthorized("expected a bearer token".into()))?;

    state.sessions.resolve(token)
}

/// JSON body extractor whose rejections use the API error format.
struct ApiJson<T>(T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(Error::Validation(rejection.body_text())),
        }
    }
}

/// Accepts `12.5` as well as `"12.5"`, as browser forms send either.
fn amount_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(n) => Ok(n),
        Amount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

async fn ready() -> &'static str {
    "OK"
}

// --- Jar endpoints ---

async fn list_jars(State(state): State<AppState>) -> Result<Json<Vec<Jar>>> {
    Ok(Json(state.ledger.list_jars()?))
}

#[derive(Debug, Deserialize)]
struct CreateJarRequest {
    name: String,
}

async fn create_jar(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateJarRequest>,
) -> Result<(StatusCode, Json<Jar>)> {
    let caller = authenticate(&state, &headers)?;
    let jar = state.coordinator.create_jar(&req.name, &caller)?;
    Ok((StatusCode::CREATED, Json(jar)))
}

async fn get_jar(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Jar>> {
    Ok(Json(state.ledger.get_jar(&id)?))
}

async fn list_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Transaction>>> {
    Ok(Json(state.ledger.list_transactions(&id)?))
}

// --- Balance endpoints ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberDeltaRequest {
    member_name: String,
    #[serde(deserialize_with = "amount_from_number_or_string")]
    amount: f64,
    actor_label: Option<String>,
}

/// Body of the add/remove routes: `name` plus an unsigned amount.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberAmountRequest {
    name: String,
    #[serde(deserialize_with = "amount_from_number_or_string")]
    amount: f64,
    actor_label: Option<String>,
}

async fn apply(
    state: &NodeState,
    headers: &HeaderMap,
    jar_id: &str,
    member_name: &str,
    amount: f64,
    actor_label: Option<String>,
) -> Result<Json<MutationOutcome>> {
    let caller = authenticate(state, headers)?;
    let actor = actor_label.unwrap_or_else(|| caller.clone());
    let outcome = state
        .coordinator
        .apply_member_delta(jar_id, &caller, member_name, amount, &actor)
        .await?;
    Ok(Json(outcome))
}

async fn apply_member_delta(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<MemberDeltaRequest>,
) -> Result<Json<MutationOutcome>> {
    apply(&state, &headers, &id, &req.member_name, req.amount, req.actor_label).await
}

async fn add_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<MemberAmountRequest>,
) -> Result<Json<MutationOutcome>> {
    apply(&state, &headers, &id, &req.name, req.amount.abs(), req.actor_label).await
}

async fn remove_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<MemberAmountRequest>,
) -> Result<Json<MutationOutcome>> {
    apply(&state, &headers, &id, &req.name, -req.amount.abs(), req.actor_label).await
}

// --- Permission endpoints ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantRequest {
    user_id: String,
}

async fn grant_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<GrantRequest>,
) -> Result<Json<Jar>> {
    let caller = authenticate(&state, &headers)?;
    let jar = state
        .coordinator
        .grant_permission(&id, &caller, &req.user_id)
        .await?;
    Ok(Json(jar))
}

async fn revoke_permission(
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Jar>> {
    let caller = authenticate(&state, &headers)?;
    let jar = state
        .coordinator
        .revoke_permission(&id, &caller, &user_id)
        .await?;
    Ok(Json(jar))
}

// --- Session endpoints ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

async fn refresh_session(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<Json<SessionTokens>> {
    Ok(Json(state.sessions.refresh(&req.refresh_token)?))
}
