//! In-process stand-in for the stamping service.
//!
//! Runs an axum server on a random localhost port from a background thread
//! with its own tokio runtime, so tests can drive the blocking client from
//! plain `#[test]` functions.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use url::Url;
use vbase_api::{api::RetryPolicy, config::ClientConfig, VBaseApiClient};

pub const API_KEY: &str = "test-api-key";
pub const ACCOUNT_ID: &str = "acct_test";

pub const DIGEST_A: &str = "0x2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
pub const DIGEST_B: &str = "0x486ea46224d1bb4fb680f34f7c9ad96a8f24ec88be73ea8e5a6c65260e9cb8a7";

/// What the next stamp request does instead of answering normally.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Reject before touching any state.
    Unavailable,
    /// Record the stamp, then answer 503 as if the response was lost.
    CommitThenUnavailable,
    /// Answer 201 with a body that isn't JSON, recording nothing.
    Garbled,
    /// Answer 500 with a plain-text body, as a proxy in front would.
    PlainTextError,
}

#[derive(Debug, Clone)]
struct CollectionRow {
    id: String,
    name: String,
    description: Option<String>,
    owner_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StampRow {
    stamp_id: String,
    collection_id: String,
    content_digest: String,
    created_at: DateTime<Utc>,
    metadata: Option<Value>,
}

#[derive(Debug, Default)]
struct ServiceState {
    collections: HashMap<String, CollectionRow>,
    stamps: HashMap<(String, String), StampRow>,
    next_id: u64,
    faults: VecDeque<Fault>,
    delay: Duration,
    requests: usize,
}

impl ServiceState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn owned_collection(&self, id: &str) -> Option<&CollectionRow> {
        self.collections
            .get(id)
            .filter(|c| c.owner_id == ACCOUNT_ID)
    }

    fn insert_collection(&mut self, id: &str, name: &str, owner_id: &str) -> CollectionRow {
        let row = CollectionRow {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        };
        self.collections.insert(id.to_string(), row.clone());
        row
    }
}

#[derive(Clone)]
struct Shared(Arc<Mutex<ServiceState>>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.0.lock().expect("service state poisoned")
    }

    fn delay(&self) -> Duration {
        let mut state = self.lock();
        state.requests += 1;
        state.delay
    }
}

pub struct FakeVBase {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeVBase {
    /// Starts the service with one collection, `reports`, owned by the test
    /// account.
    pub fn start() -> Self {
        let state = Shared(Arc::new(Mutex::new(ServiceState::default())));
        state.lock().insert_collection("reports", "Quarterly reports", ACCOUNT_ID);

        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = router(state.clone());

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("Failed to build test runtime");

            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("Failed to bind to random port");
                addr_tx
                    .send(listener.local_addr().expect("Failed to get local address"))
                    .expect("Test waits for the address");

                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.await.ok();
                    })
                    .await
                    .expect("Test server failed");
            });
        });

        let addr = addr_rx.recv().expect("Test server didn't start");

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/api/v1/", self.addr)).expect("valid test url")
    }

    /// Config with the valid key, a short timeout and fast retries.
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.url(), API_KEY)
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetryPolicy {
                max_retries: 3,
                min_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(50),
                jitter: false,
            })
    }

    pub fn client(&self) -> VBaseApiClient {
        VBaseApiClient::new(self.config()).expect("valid client config")
    }

    pub fn client_with_key(&self, api_key: &str) -> VBaseApiClient {
        let config = ClientConfig::new(self.url(), api_key).with_timeout(Duration::from_secs(5));
        VBaseApiClient::new(config).expect("valid client config")
    }

    pub fn seed_collection(&self, id: &str, owner_id: &str) {
        self.state.lock().insert_collection(id, id, owner_id);
    }

    pub fn inject_faults(&self, faults: impl IntoIterator<Item = Fault>) {
        self.state.lock().faults.extend(faults);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    /// Durable stamp records held by the service.
    pub fn stamp_count(&self) -> usize {
        self.state.lock().stamps.len()
    }

    /// Requests that reached a handler.
    pub fn requests(&self) -> usize {
        self.state.lock().requests
    }
}

impl Drop for FakeVBase {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route(
            "/api/v1/collections",
            post(create_collection).get(list_collections),
        )
        .route("/api/v1/collections/:id", get(get_collection))
        .route("/api/v1/stamps", post(create_stamp))
        .route("/api/v1/verify", post(verify_stamp))
        .route("/api/v1/account/settings", get(account_settings))
        .with_state(state)
}

fn error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Bearer {API_KEY}");
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        Some(_) => Err(error(StatusCode::UNAUTHORIZED, "invalid or expired API key")),
        None => Err(error(StatusCode::UNAUTHORIZED, "missing API key")),
    }
}

async fn pause(state: &Shared) {
    let delay = state.delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn collection_json(row: &CollectionRow) -> Value {
    json!({
        "id": row.id,
        "name": row.name,
        "description": row.description,
        "owner_id": row.owner_id,
        "created_at": row.created_at.to_rfc3339(),
    })
}

fn stamp_json(row: &StampRow) -> Value {
    let mut body = json!({
        "stamp_id": row.stamp_id,
        "collection_id": row.collection_id,
        "content_digest": row.content_digest,
        "created_at": row.created_at.to_rfc3339(),
    });
    if let Some(metadata) = &row.metadata {
        body["metadata"] = metadata.clone();
    }
    body
}

fn field<'a>(body: &'a Value, name: &str) -> Result<&'a str, Response> {
    body.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, &format!("{name} is required")))
}

async fn create_collection(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    pause(&state).await;
    if let Err(response) = authorize(&headers) {
        return response;
    }

    let name = match field(&body, "name") {
        Ok(name) => name,
        Err(response) => return response,
    };
    if name.len() > 64 {
        return error(
            StatusCode::BAD_REQUEST,
            "collection name must be at most 64 characters",
        );
    }

    let mut state = state.lock();
    let id = state.next_id("col");
    let mut row = state.insert_collection(&id, name, ACCOUNT_ID);
    row.description = body
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    state.collections.insert(id, row.clone());

    (StatusCode::CREATED, Json(collection_json(&row))).into_response()
}

async fn list_collections(State(state): State<Shared>, headers: HeaderMap) -> Response {
    pause(&state).await;
    if let Err(response) = authorize(&headers) {
        return response;
    }

    let state = state.lock();
    let mut rows: Vec<&CollectionRow> = state
        .collections
        .values()
        .filter(|c| c.owner_id == ACCOUNT_ID)
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    let collections: Vec<Value> = rows.into_iter().map(collection_json).collect();

    Json(json!({ "collections": collections })).into_response()
}

async fn get_collection(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    pause(&state).await;
    if let Err(response) = authorize(&headers) {
        return response;
    }

    let state = state.lock();
    match state.owned_collection(&id) {
        Some(row) => Json(collection_json(row)).into_response(),
        None => error(StatusCode::NOT_FOUND, &format!("collection {id} not found")),
    }
}

async fn create_stamp(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    pause(&state).await;
    if let Err(response) = authorize(&headers) {
        return response;
    }

    let (collection_id, content_digest) =
        match (field(&body, "collection_id"), field(&body, "content_digest")) {
            (Ok(c), Ok(d)) => (c.to_string(), d.to_string()),
            (Err(response), _) | (_, Err(response)) => return response,
        };

    let mut state = state.lock();
    let fault = state.faults.pop_front();
    match fault {
        Some(Fault::Unavailable) => {
            return error(StatusCode::SERVICE_UNAVAILABLE, "temporarily unavailable");
        }
        Some(Fault::Garbled) => {
            return (StatusCode::CREATED, "<html>stamped</html>").into_response();
        }
        Some(Fault::PlainTextError) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response();
        }
        _ => {}
    }

    if state.owned_collection(&collection_id).is_none() {
        return error(
            StatusCode::NOT_FOUND,
            &format!("collection {collection_id} not found"),
        );
    }

    let key = (collection_id.clone(), content_digest.clone());
    let (status, row, idempotent) = match state.stamps.get(&key) {
        Some(existing) => (StatusCode::OK, existing.clone(), true),
        None => {
            let row = StampRow {
                stamp_id: state.next_id("stp"),
                collection_id,
                content_digest,
                created_at: Utc::now(),
                metadata: body.get("metadata").cloned(),
            };
            state.stamps.insert(key, row.clone());
            (StatusCode::CREATED, row, false)
        }
    };

    if matches!(fault, Some(Fault::CommitThenUnavailable)) {
        return error(StatusCode::SERVICE_UNAVAILABLE, "upstream connection reset");
    }

    let mut response = stamp_json(&row);
    response["idempotent"] = json!(idempotent);
    (status, Json(response)).into_response()
}

async fn verify_stamp(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    pause(&state).await;
    if let Err(response) = authorize(&headers) {
        return response;
    }

    let (collection_id, content_digest) =
        match (field(&body, "collection_id"), field(&body, "content_digest")) {
            (Ok(c), Ok(d)) => (c.to_string(), d.to_string()),
            (Err(response), _) | (_, Err(response)) => return response,
        };

    let state = state.lock();
    if state.owned_collection(&collection_id).is_none() {
        return error(
            StatusCode::NOT_FOUND,
            &format!("collection {collection_id} not found"),
        );
    }

    match state.stamps.get(&(collection_id, content_digest)) {
        Some(row) => Json(json!({ "verified": true, "stamp": stamp_json(row) })).into_response(),
        None => Json(json!({
            "verified": false,
            "reason": "not found: no stamp for this digest in the collection",
        }))
        .into_response(),
    }
}

async fn account_settings(State(state): State<Shared>, headers: HeaderMap) -> Response {
    pause(&state).await;
    if let Err(response) = authorize(&headers) {
        return response;
    }

    Json(json!({
        "account_id": ACCOUNT_ID,
        "api_key_scopes": ["stamp:read", "stamp:write"],
        "default_collection_id": "reports",
        "rate_limit_per_minute": 600,
    }))
    .into_response()
}
