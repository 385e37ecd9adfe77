#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    dead_code,
    missing_docs,
    clippy::expect_used
)]
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

/// The token the refresher hands out; the only one `/api/strict/me` accepts.
pub fn fresh_token() -> String {
    jwt("fresh", 3600, None)
}

/// A JWT with `sub`, `exp` relative to now and an optional `role`.
pub fn jwt(sub: &str, exp_offset: i64, role: Option<&str>) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("after epoch")
        .as_secs();
    let exp = i64::try_from(now).expect("fits") + exp_offset;
    let mut claims = json!({ "sub": sub, "exp": exp });
    if let Some(role) = role {
        claims["role"] = json!(role);
    }
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// What the server received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }
}

#[derive(Debug, Clone, Default)]
struct AppState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[derive(Debug)]
pub struct TestApp {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

impl TestApp {
    pub async fn start() -> anyhow::Result<Self> {
        let state = AppState::default();
        let requests = Arc::clone(&state.requests);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("binding test listener")?;
        let addr = listener.local_addr()?;
        let router = router(state);

        let server = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, router).await {
                tracing::error!(?error, "test server stopped");
            }
        });
        info!(%addr, "test server started");

        Ok(Self {
            base_url: format!("http://{addr}"),
            requests,
            server,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("at least one request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users", post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/search", get(search))
        .route("/things/{id}", delete(delete_thing))
        .route("/secure/me", get(me))
        .route("/strict/me", get(strict_me))
        .route("/slow", get(slow))
        .route("/errors/{status}", get(failing))
        .route("/validation", post(validation));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

async fn record(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    state.requests.lock().expect("lock").push(RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(ToString::to_string),
        headers: parts.headers.clone(),
        body: bytes.clone(),
    });
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn create_user(Json(user): Json<Value>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(json!({ "id": 42, "user": user })))
}

async fn get_user(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "id": id, "name": "Ada" }))
}

async fn search(request: Request) -> Json<Value> {
    Json(json!({ "query": request.uri().query() }))
}

async fn delete_thing(Path(_id): Path<u32>) -> StatusCode {
    StatusCode::NO_CONTENT
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn me(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some(_) => Json(json!({ "name": "Ada" })).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        )
            .into_response(),
    }
}

async fn strict_me(headers: HeaderMap) -> Response {
    if bearer(&headers) == Some(fresh_token().as_str()) {
        Json(json!({ "name": "Ada" })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token revoked" })),
        )
            .into_response()
    }
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(json!({ "slow": true }))
}

async fn failing(Path(status): Path<u16>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let message = status.canonical_reason().unwrap_or("Failure");
    (status, Json(json!({ "message": message }))).into_response()
}

async fn validation() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "message": "Bad Request",
            "type": "https://errors.example.com/validation",
            "detail": "1 field is invalid",
            "errors": [
                { "property": "name", "constraint": "isString", "message": "name must be a string" }
            ]
        })),
    )
        .into_response()
}
