// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process stand-ins for the backend, the realtime server and the
//! identity provider.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use teamhub::config::Config;
use teamhub::error::{AppError, Result};
use teamhub::models::Identity;
use teamhub::services::{CredentialGateway, IdentityToolkitGateway, LocalStorage};
use teamhub::AppState;

pub const TOKEN: &str = "token-1";

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub fn user_json(team_id: Option<&str>) -> Value {
    json!({
        "_id": "u1",
        "name": "Alice Smith",
        "email": "alice@example.com",
        "role": "MEMBER",
        "teamId": team_id,
    })
}

pub fn identity(email: &str) -> Identity {
    Identity {
        uid: format!("fb-{email}"),
        email: email.to_string(),
        id_token: "id-token".to_string(),
    }
}

// ─── Backend State ───────────────────────────────────────────────

pub struct MockState {
    /// Route keys (`"PUT /tasks"`) in arrival order.
    pub calls: Mutex<Vec<String>>,
    /// Route key -> (status, message) to answer with instead.
    pub failures: Mutex<HashMap<String, (u16, String)>>,
    pub user: Mutex<Value>,
    pub projects: Mutex<Vec<Value>>,
    pub tasks: Mutex<Vec<Value>>,
    pub messages: Mutex<Vec<Value>>,
    pub history_delay: Mutex<Duration>,
    /// Applied after the store is read, so the response can go stale.
    pub tasks_delay: Mutex<Duration>,
    pub profile_delay: Mutex<Duration>,
    /// Realtime server log: `connect <token>`, `disconnect <token>`,
    /// `closed <token>`, `pong`, and `<event> <data>` for inbound emits.
    pub socket_log: Mutex<Vec<String>>,
    pub rejected_tokens: Mutex<HashSet<String>>,
    pub connections: AtomicUsize,
    pub open_sockets: AtomicUsize,
    pushes: broadcast::Sender<(Option<String>, String)>,
    next_id: AtomicUsize,
}

impl MockState {
    fn new() -> Self {
        let (pushes, _) = broadcast::channel(256);
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            user: Mutex::new(user_json(Some("team1"))),
            projects: Mutex::new(vec![
                json!({"_id": "p1", "name": "Apollo", "teamId": "team1"}),
                json!({"_id": "p2", "name": "Gemini", "teamId": {"_id": "team1", "name": "Core"}}),
                json!({"_id": "p3", "name": "Other", "teamId": "team2"}),
            ]),
            tasks: Mutex::new(vec![
                json!({"_id": "t1", "title": "Design", "status": "todo", "projectId": "p1"}),
                json!({"_id": "t2", "title": "Build", "status": "in-progress", "projectId": "p1"}),
                json!({"_id": "t3", "title": "Launch", "status": "done", "projectId": "p2"}),
            ]),
            messages: Mutex::new(vec![
                json!({
                    "_id": "m1",
                    "content": "hello",
                    "senderId": {"_id": "u1", "name": "Alice Smith"},
                    "teamId": "team1",
                    "timestamp": "2025-01-01T10:00:00Z",
                }),
                json!({
                    "_id": "m2",
                    "content": "hi",
                    "senderId": "u2",
                    "teamId": "team1",
                    "timestamp": "2025-01-01T10:01:00Z",
                }),
            ]),
            history_delay: Mutex::new(Duration::ZERO),
            tasks_delay: Mutex::new(Duration::ZERO),
            profile_delay: Mutex::new(Duration::ZERO),
            socket_log: Mutex::new(Vec::new()),
            rejected_tokens: Mutex::new(HashSet::new()),
            connections: AtomicUsize::new(0),
            open_sockets: AtomicUsize::new(0),
            pushes,
            next_id: AtomicUsize::new(100),
        }
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn log(&self, entry: String) {
        self.socket_log.lock().unwrap().push(entry);
    }

    /// Record the call and return the injected failure, if any.
    fn guard(&self, key: &str) -> Option<Response> {
        self.calls.lock().unwrap().push(key.to_string());
        let (status, message) = self.failures.lock().unwrap().get(key).cloned()?;
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Some((status, Json(json!({"success": false, "message": message}))).into_response())
    }

    fn broadcast(&self, room: Option<&str>, frame: String) {
        let _ = self.pushes.send((room.map(str::to_string), frame));
    }
}

fn envelope(data: Value) -> Response {
    Json(json!({"success": true, "message": "OK", "data": data})).into_response()
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

fn reference_id(value: &Value) -> Option<&str> {
    value.as_str().or_else(|| value.get("_id").and_then(Value::as_str))
}

// ─── Mock Server ─────────────────────────────────────────────────

pub struct MockBackend {
    pub state: Arc<MockState>,
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let router = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/me", get(me))
            .route("/api/projects", get(list_projects).post(create_project))
            .route("/api/projects/{id}", put(update_project).delete(delete_project))
            .route("/api/tasks", get(list_tasks).post(create_task))
            .route("/api/tasks/{id}", put(update_task).delete(delete_task))
            .route("/api/messages", get(list_messages).post(send_message))
            .route("/v1/{action}", post(identity_toolkit))
            .route("/socket.io/", get(socket_io))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { state, addr, task }
    }

    pub fn config(&self) -> Config {
        Config {
            api_url: format!("http://{}/api", self.addr),
            socket_url: format!("ws://{}", self.addr),
            auth_url: format!("http://{}/v1", self.addr),
            ..Config::test_default()
        }
    }

    /// Client stack around `gateway`, with in-memory storage.
    pub fn app(&self, gateway: Arc<dyn CredentialGateway>) -> Arc<AppState> {
        self.app_with(self.config(), LocalStorage::in_memory(), gateway)
    }

    pub fn app_with(
        &self,
        config: Config,
        storage: LocalStorage,
        gateway: Arc<dyn CredentialGateway>,
    ) -> Arc<AppState> {
        AppState::with_gateway(config, storage, gateway).unwrap()
    }

    /// Client stack with the real Identity Toolkit gateway.
    pub fn app_with_identity_toolkit(&self, storage: LocalStorage) -> Arc<AppState> {
        let gateway = IdentityToolkitGateway::new(&self.config(), storage.clone()).unwrap();
        self.app_with(self.config(), storage, Arc::new(gateway))
    }

    pub fn fail(&self, key: &str, status: u16, message: &str) {
        self.state
            .failures
            .lock()
            .unwrap()
            .insert(key.to_string(), (status, message.to_string()));
    }

    pub fn heal(&self, key: &str) {
        self.state.failures.lock().unwrap().remove(key);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn count(&self, key: &str) -> usize {
        self.state.calls.lock().unwrap().iter().filter(|c| *c == key).count()
    }

    pub fn socket_log(&self) -> Vec<String> {
        self.state.socket_log.lock().unwrap().clone()
    }

    pub fn logged(&self, entry: &str) -> bool {
        self.state.socket_log.lock().unwrap().iter().any(|e| e == entry)
    }

    pub fn set_user(&self, user: Value) {
        *self.state.user.lock().unwrap() = user;
    }

    pub fn set_history_delay(&self, delay: Duration) {
        *self.state.history_delay.lock().unwrap() = delay;
    }

    pub fn set_tasks_delay(&self, delay: Duration) {
        *self.state.tasks_delay.lock().unwrap() = delay;
    }

    pub fn set_profile_delay(&self, delay: Duration) {
        *self.state.profile_delay.lock().unwrap() = delay;
    }

    pub fn reject_token(&self, token: &str) {
        self.state.rejected_tokens.lock().unwrap().insert(token.to_string());
    }

    /// Emit `event` to every socket.
    pub fn push(&self, event: &str, data: Value) {
        self.state.broadcast(None, format!("42{}", json!([event, data])));
    }

    /// Emit `event` to sockets that joined `team_id`.
    pub fn push_to_team(&self, team_id: &str, event: &str, data: Value) {
        self.state
            .broadcast(Some(team_id), format!("42{}", json!([event, data])));
    }

    /// Send a raw Engine.IO frame to every socket.
    pub fn raw(&self, frame: &str) {
        self.state.broadcast(None, frame.to_string());
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn open_sockets(&self) -> usize {
        self.state.open_sockets.load(Ordering::SeqCst)
    }
}

// ─── REST Handlers ───────────────────────────────────────────────

async fn login(State(state): State<Arc<MockState>>) -> Response {
    if let Some(failure) = state.guard("POST /auth/login") {
        return failure;
    }
    let user = state.user.lock().unwrap().clone();
    envelope(json!({"token": TOKEN, "user": user}))
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if let Some(failure) = state.guard("POST /auth/register") {
        return failure;
    }
    let mut user = state.user.lock().unwrap().clone();
    merge(
        &mut user,
        &json!({
            "name": body.get("name").cloned().unwrap_or(Value::Null),
            "email": body.get("email").cloned().unwrap_or(Value::Null),
            "role": body.get("role").cloned().unwrap_or(json!("MEMBER")),
        }),
    );
    envelope(json!({"token": TOKEN, "user": user}))
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Some(failure) = state.guard("GET /auth/me") {
        return failure;
    }
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer.is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "message": "No token provided"})),
        )
            .into_response();
    }
    let user = state.user.lock().unwrap().clone();
    let delay = *state.profile_delay.lock().unwrap();
    tokio::time::sleep(delay).await;
    envelope(json!({"user": user}))
}

async fn list_projects(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(failure) = state.guard("GET /projects") {
        return failure;
    }
    let team = query.get("teamId");
    let projects: Vec<Value> = state
        .projects
        .lock()
        .unwrap()
        .iter()
        .filter(|p| team.is_none_or(|t| reference_id(&p["teamId"]) == Some(t.as_str())))
        .cloned()
        .collect();
    envelope(json!({"projects": projects}))
}

async fn create_project(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if let Some(failure) = state.guard("POST /projects") {
        return failure;
    }
    let mut project = body;
    merge(&mut project, &json!({"_id": format!("p{}", state.next_id())}));
    state.projects.lock().unwrap().push(project.clone());
    envelope(json!({"project": project}))
}

async fn update_project(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Response {
    if let Some(failure) = state.guard("PUT /projects") {
        return failure;
    }
    let mut projects = state.projects.lock().unwrap();
    match projects.iter_mut().find(|p| p["_id"] == id.as_str()) {
        Some(project) => {
            merge(project, &patch);
            envelope(json!({"project": project.clone()}))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "Project not found"})),
        )
            .into_response(),
    }
}

async fn delete_project(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    if let Some(failure) = state.guard("DELETE /projects") {
        return failure;
    }
    state.projects.lock().unwrap().retain(|p| p["_id"] != id.as_str());
    envelope(Value::Null)
}

async fn list_tasks(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(failure) = state.guard("GET /tasks") {
        return failure;
    }
    let project = query.get("projectId");
    let tasks: Vec<Value> = state
        .tasks
        .lock()
        .unwrap()
        .iter()
        .filter(|t| project.is_none_or(|p| reference_id(&t["projectId"]) == Some(p.as_str())))
        .cloned()
        .collect();
    let delay = *state.tasks_delay.lock().unwrap();
    tokio::time::sleep(delay).await;
    envelope(json!({"tasks": tasks}))
}

async fn create_task(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if let Some(failure) = state.guard("POST /tasks") {
        return failure;
    }
    let mut task = body;
    merge(&mut task, &json!({"_id": format!("t{}", state.next_id())}));
    state.tasks.lock().unwrap().push(task.clone());
    envelope(json!({"task": task}))
}

async fn update_task(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Response {
    if let Some(failure) = state.guard("PUT /tasks") {
        return failure;
    }
    let mut tasks = state.tasks.lock().unwrap();
    match tasks.iter_mut().find(|t| t["_id"] == id.as_str()) {
        Some(task) => {
            merge(task, &patch);
            envelope(json!({"task": task.clone()}))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "Task not found"})),
        )
            .into_response(),
    }
}

async fn delete_task(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> Response {
    if let Some(failure) = state.guard("DELETE /tasks") {
        return failure;
    }
    state.tasks.lock().unwrap().retain(|t| t["_id"] != id.as_str());
    envelope(Value::Null)
}

async fn list_messages(
    State(state): State<Arc<MockState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let delay = *state.history_delay.lock().unwrap();
    tokio::time::sleep(delay).await;

    if let Some(failure) = state.guard("GET /messages") {
        return failure;
    }
    let team = query.get("teamId").cloned().unwrap_or_default();
    let limit: usize = query
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(50);
    let all: Vec<Value> = state
        .messages
        .lock()
        .unwrap()
        .iter()
        .filter(|m| reference_id(&m["teamId"]) == Some(team.as_str()))
        .cloned()
        .collect();
    let start = all.len().saturating_sub(limit);
    envelope(json!({"messages": &all[start..]}))
}

async fn send_message(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if let Some(failure) = state.guard("POST /messages") {
        return failure;
    }
    let team = body["teamId"].as_str().unwrap_or_default().to_string();
    let user = state.user.lock().unwrap().clone();
    let message = json!({
        "_id": format!("m{}", state.next_id()),
        "content": body["content"],
        "senderId": {"_id": user["_id"], "name": user["name"]},
        "teamId": team,
        "timestamp": "2025-01-01T12:00:00Z",
    });
    state.messages.lock().unwrap().push(message.clone());
    state.broadcast(Some(&team), format!("42{}", json!(["new-message", message])));
    envelope(json!({"message": message}))
}

// ─── Identity Provider ───────────────────────────────────────────

async fn identity_toolkit(
    State(state): State<Arc<MockState>>,
    Path(action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let key = format!("POST /{action}");
    state.calls.lock().unwrap().push(key.clone());

    let provider_error = |code: &str| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"code": 400, "message": code}})),
        )
            .into_response()
    };

    if query.get("key").map(String::as_str) != Some("test-api-key") {
        return provider_error("API_KEY_INVALID");
    }
    let failure = state.failures.lock().unwrap().get(&key).cloned();
    if let Some((_, code)) = failure {
        return provider_error(&code);
    }

    let email = body["email"].as_str().unwrap_or_default();
    match action.as_str() {
        "accounts:signInWithPassword" | "accounts:signUp" => Json(json!({
            "localId": format!("fb-{email}"),
            "email": email,
            "idToken": "id-token",
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

// ─── Realtime Server ─────────────────────────────────────────────

async fn socket_io(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<Arc<MockState>>,
) -> Response {
    if query.get("EIO").map(String::as_str) != Some("4")
        || query.get("transport").map(String::as_str) != Some("websocket")
    {
        return StatusCode::BAD_REQUEST.into_response();
    }
    ws.on_upgrade(move |socket| engine_io_session(socket, state))
}

async fn engine_io_session(socket: WebSocket, state: Arc<MockState>) {
    let n = state.next_id();
    let (mut tx, mut rx) = socket.split();
    let mut pushes = state.pushes.subscribe();

    let open = json!({
        "sid": format!("eio-{n}"),
        "upgrades": [],
        "pingInterval": 25000,
        "pingTimeout": 20000,
        "maxPayload": 1000000,
    });
    if tx.send(WsMessage::text(format!("0{open}"))).await.is_err() {
        return;
    }

    let token = loop {
        match rx.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Some(payload) = text.as_str().strip_prefix("40") {
                    let auth: Value = serde_json::from_str(payload).unwrap_or(Value::Null);
                    break auth["token"].as_str().unwrap_or_default().to_string();
                }
            }
            Some(Ok(_)) => continue,
            _ => return,
        }
    };

    let rejected = state.rejected_tokens.lock().unwrap().contains(&token);
    if rejected {
        state.log(format!("rejected {token}"));
        let _ = tx
            .send(WsMessage::text(r#"44{"message":"Authentication error"}"#))
            .await;
        let _ = tx.close().await;
        return;
    }

    if tx
        .send(WsMessage::text(format!("40{}", json!({"sid": format!("sio-{n}")}))))
        .await
        .is_err()
    {
        return;
    }
    state.log(format!("connect {token}"));
    state.connections.fetch_add(1, Ordering::SeqCst);
    state.open_sockets.fetch_add(1, Ordering::SeqCst);

    let mut rooms: HashSet<String> = HashSet::new();
    loop {
        tokio::select! {
            frame = rx.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    let text = text.as_str();
                    if text == "41" {
                        state.log(format!("disconnect {token}"));
                        break;
                    }
                    if text == "3" {
                        state.log("pong".to_string());
                        continue;
                    }
                    let Some(body) = text.strip_prefix("42") else { continue };
                    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) else { continue };
                    let name = items.first().and_then(Value::as_str).unwrap_or_default().to_string();
                    let data = items.get(1).cloned().unwrap_or(Value::Null);
                    match name.as_str() {
                        "join-team" => {
                            rooms.insert(data.as_str().unwrap_or_default().to_string());
                        }
                        "leave-team" => {
                            rooms.remove(data.as_str().unwrap_or_default());
                        }
                        _ => {}
                    }
                    let data = data.as_str().map(str::to_string).unwrap_or_else(|| data.to_string());
                    state.log(format!("{name} {data}"));
                }
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => {
                    state.log(format!("closed {token}"));
                    break;
                }
                Some(Ok(_)) => {}
            },
            push = pushes.recv() => match push {
                Ok((room, frame)) => {
                    if room.as_ref().is_none_or(|r| rooms.contains(r))
                        && tx.send(WsMessage::text(frame)).await.is_err()
                    {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    state.open_sockets.fetch_sub(1, Ordering::SeqCst);
}

// ─── Credential Gateway Double ───────────────────────────────────

/// In-memory credential gateway with switchable failures.
pub struct FakeGateway {
    state: watch::Sender<Option<Identity>>,
    pub sign_ins: AtomicUsize,
    pub sign_outs: AtomicUsize,
    pub fail_sign_in: Mutex<Option<String>>,
    pub fail_sign_out: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Self::with_identity(None)
    }

    /// Already signed in, as after a restart.
    pub fn signed_in(email: &str) -> Arc<Self> {
        Self::with_identity(Some(identity(email)))
    }

    fn with_identity(identity: Option<Identity>) -> Arc<Self> {
        let (state, _) = watch::channel(identity);
        Arc::new(Self {
            state,
            sign_ins: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
            fail_sign_in: Mutex::new(None),
            fail_sign_out: AtomicBool::new(false),
        })
    }

    /// Publish an identity change, as the provider would.
    pub fn emit(&self, identity: Option<Identity>) {
        self.state.send_replace(identity);
    }

    fn sign_in_result(&self, email: &str) -> Result<Identity> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_sign_in.lock().unwrap().clone() {
            return Err(AppError::Auth(message));
        }
        let identity = identity(email);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl CredentialGateway for FakeGateway {
    async fn sign_in(&self, email: &str, _password: &str) -> Result<Identity> {
        self.sign_in_result(email)
    }

    async fn create_account(&self, email: &str, _password: &str) -> Result<Identity> {
        self.sign_in_result(email)
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AppError::Auth("Provider sign-out failed".to_string()));
        }
        self.state.send_replace(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}
