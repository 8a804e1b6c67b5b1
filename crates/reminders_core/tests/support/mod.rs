//! In-process fake of the remote reminders table and the text transform
//! endpoints, served with axum on an ephemeral port.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use reminders_core::{ReminderDraft, RemoteConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_API_KEY: &str = "test-anon-key";

#[derive(Clone, Default)]
pub struct FakeTable {
    rows: Arc<Mutex<Vec<Value>>>,
    next_id: Arc<AtomicI64>,
    failing: Arc<AtomicBool>,
    omit_inserted: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
}

impl FakeTable {
    pub fn rows(&self) -> Vec<Value> {
        self.rows.lock().unwrap().clone()
    }

    /// Makes every following request answer 503.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Keeps committing inserts but answers them with an empty `201 []`.
    pub fn set_omit_inserted(&self, omit: bool) {
        self.omit_inserted.store(omit, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Inserts a row directly, bypassing the HTTP API.
    pub fn seed(&self, title: &str, due_at: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.lock().unwrap().push(json!({
            "id": id,
            "user_id": "user-1",
            "title": title,
            "due_at": due_at,
            "note": null,
            "completed": false,
            "created_at": "2023-12-31T12:00:00+00:00",
        }));
        id.to_string()
    }

    fn reject(&self, headers: &HeaderMap) -> Option<Response> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Some((StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response());
        }
        let key = headers.get("apikey").and_then(|value| value.to_str().ok());
        if key != Some(TEST_API_KEY) {
            return Some(
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "message": "Invalid API key" })),
                )
                    .into_response(),
            );
        }
        None
    }
}

fn id_filter(params: &HashMap<String, String>) -> Option<String> {
    params
        .get("id")
        .and_then(|value| value.strip_prefix("eq."))
        .map(str::to_string)
}

fn row_id(row: &Value) -> String {
    match &row["id"] {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        _ => String::new(),
    }
}

async fn list_rows(State(table): State<FakeTable>, headers: HeaderMap) -> Response {
    if let Some(rejection) = table.reject(&headers) {
        return rejection;
    }
    Json(Value::Array(table.rows())).into_response()
}

async fn insert_rows(
    State(table): State<FakeTable>,
    headers: HeaderMap,
    Json(payload): Json<Vec<Value>>,
) -> Response {
    if let Some(rejection) = table.reject(&headers) {
        return rejection;
    }
    let mut created = Vec::new();
    for mut row in payload {
        if row["title"].as_str().unwrap_or("").is_empty() {
            return (StatusCode::BAD_REQUEST, "title required").into_response();
        }
        let id = table.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        row["id"] = json!(id);
        row["user_id"] = json!("user-1");
        row["created_at"] = json!("2024-01-01T08:00:00+00:00");
        created.push(row);
    }
    table.rows.lock().unwrap().extend(created.iter().cloned());
    if table.omit_inserted.load(Ordering::SeqCst) {
        created.clear();
    }
    (StatusCode::CREATED, Json(Value::Array(created))).into_response()
}

async fn update_rows(
    State(table): State<FakeTable>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(patch): Json<Value>,
) -> Response {
    if let Some(rejection) = table.reject(&headers) {
        return rejection;
    }
    let Some(id) = id_filter(&params) else {
        return (StatusCode::BAD_REQUEST, "missing id filter").into_response();
    };
    let mut rows = table.rows.lock().unwrap();
    let mut updated = Vec::new();
    for row in rows.iter_mut().filter(|row| row_id(row) == id) {
        if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        updated.push(row.clone());
    }
    Json(Value::Array(updated)).into_response()
}

async fn delete_rows(
    State(table): State<FakeTable>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(rejection) = table.reject(&headers) {
        return rejection;
    }
    let Some(id) = id_filter(&params) else {
        return (StatusCode::BAD_REQUEST, "missing id filter").into_response();
    };
    let mut rows = table.rows.lock().unwrap();
    let (removed, kept): (Vec<Value>, Vec<Value>) =
        rows.drain(..).partition(|row| row_id(row) == id);
    *rows = kept;
    Json(Value::Array(removed)).into_response()
}

/// Starts the fake table and returns it with its base URL.
pub async fn spawn_fake_table() -> (FakeTable, String) {
    let table = FakeTable::default();
    let app = Router::new()
        .route(
            "/rest/v1/reminders",
            get(list_rows)
                .post(insert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .with_state(table.clone());
    let base_url = serve(app).await;
    (table, base_url)
}

/// Recorded text-transform calls, keyed by endpoint.
#[derive(Clone, Default)]
pub struct FakeAi {
    pub alternate_calls: Arc<AtomicUsize>,
    pub provider_calls: Arc<AtomicUsize>,
    pub alternate_failing: Arc<AtomicBool>,
    pub last_provider_body: Arc<Mutex<Option<Value>>>,
}

async fn alternate_endpoint(State(ai): State<FakeAi>, Json(body): Json<Value>) -> Response {
    ai.alternate_calls.fetch_add(1, Ordering::SeqCst);
    if ai.alternate_failing.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let action = body["action"].as_str().unwrap_or("");
    let text = body["text"].as_str().unwrap_or("");
    Json(json!({ "result": format!("alt:{action}:{text}") })).into_response()
}

async fn provider_endpoint(
    State(ai): State<FakeAi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    ai.provider_calls.fetch_add(1, Ordering::SeqCst);
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some("Bearer sk-test");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    *ai.last_provider_body.lock().unwrap() = Some(body);
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "  provider answer \n" } }]
    }))
    .into_response()
}

/// Starts fake alternate (`/ai`) and provider (`/v1/chat/completions`)
/// endpoints on one server.
pub async fn spawn_fake_ai() -> (FakeAi, String) {
    let ai = FakeAi::default();
    let app = Router::new()
        .route("/ai", post(alternate_endpoint))
        .route("/v1/chat/completions", post(provider_endpoint))
        .with_state(ai.clone());
    let base_url = serve(app).await;
    (ai, base_url)
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn remote_config(base_url: &str) -> RemoteConfig {
    RemoteConfig {
        url: Some(base_url.to_string()),
        api_key: Some(TEST_API_KEY.to_string()),
        timeout_secs: 5,
        ..RemoteConfig::default()
    }
}

pub fn pay_rent() -> ReminderDraft {
    ReminderDraft::new("Pay rent", Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        .with_note("monthly")
}
