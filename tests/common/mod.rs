#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use parking_lot::Mutex;
use rustalink_client::{
    ClientConfig, ClientEvent, Config, NodeConfig, NodeRegistry,
};
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc::UnboundedReceiver};

pub const PASSWORD: &str = "youshallnotpass";
pub const USER_ID: u64 = 1234;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Value,
    pub authorization: Option<String>,
}

/// Misbehaviour applied to event-stream upgrades past a given attempt.
#[derive(Debug, Clone, Copy)]
pub enum UpgradeFault {
    /// Answer the upgrade with this HTTP status.
    Reject(u16),
    /// Hold the upgrade open this long, then answer 503.
    Stall(Duration),
}

#[derive(Debug, Clone)]
enum Push {
    Frame(String),
    Close,
}

struct MockState {
    upgrades: AtomicUsize,
    sessions: AtomicUsize,
    close_first: AtomicBool,
    handshake_headers: Mutex<Vec<HeaderMap>>,
    requests: Mutex<Vec<RecordedRequest>>,
    push: broadcast::Sender<Push>,
    load_status: AtomicU16,
    load_body: Mutex<Value>,
    upgrade_fault: Mutex<Option<(usize, UpgradeFault)>>,
    player_update_delay_ms: AtomicU64,
    player_updates_started: AtomicUsize,
}

/// In-process node speaking the v4 REST and event-stream surface.
pub struct MockNode {
    pub port: u16,
    state: Arc<MockState>,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub fn track_json(encoded: &str, title: &str) -> Value {
    json!({
        "encoded": encoded,
        "info": {
            "identifier": format!("id-{}", encoded),
            "isSeekable": true,
            "author": "Artist",
            "length": 215000,
            "isStream": false,
            "position": 0,
            "title": title,
            "uri": "https://example.com/track",
            "artworkUrl": null,
            "isrc": null,
            "sourceName": "http"
        },
        "pluginInfo": {},
        "userData": {}
    })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .is_some_and(|auth| auth == PASSWORD)
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

impl MockNode {
    pub async fn start() -> Self {
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(MockState {
            upgrades: AtomicUsize::new(0),
            sessions: AtomicUsize::new(0),
            close_first: AtomicBool::new(false),
            handshake_headers: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            push,
            load_status: AtomicU16::new(200),
            load_body: Mutex::new(json!({"loadType": "empty", "data": {}})),
            upgrade_fault: Mutex::new(None),
            player_update_delay_ms: AtomicU64::new(0),
            player_updates_started: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/v4/websocket", get(websocket_handler))
            .route("/v4/loadtracks", get(load_tracks))
            .route(
                "/v4/sessions/{session_id}/players/{guild_id}",
                patch(update_player).delete(destroy_player),
            )
            .route("/v4/sessions/{session_id}", patch(update_session))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            port,
            state,
            server,
        }
    }

    pub fn node_config(&self, identifier: &str) -> NodeConfig {
        NodeConfig::new("127.0.0.1", self.port, PASSWORD).with_identifier(identifier)
    }

    /// The first event-stream connection is closed right after `ready`.
    pub fn close_first_connection(&self) {
        self.state.close_first.store(true, Ordering::SeqCst);
    }

    /// Closes every open event stream with code 1001.
    pub fn close_connections(&self) {
        let _ = self.state.push.send(Push::Close);
    }

    pub fn push_frame(&self, frame: Value) {
        let _ = self.state.push.send(Push::Frame(frame.to_string()));
    }

    pub fn set_load_response(&self, status: u16, body: Value) {
        self.state.load_status.store(status, Ordering::SeqCst);
        *self.state.load_body.lock() = body;
    }

    /// Applies `fault` to every upgrade attempt after the first `attempts`.
    pub fn fault_upgrades_after(&self, attempts: usize, fault: UpgradeFault) {
        *self.state.upgrade_fault.lock() = Some((attempts, fault));
    }

    pub fn accept_upgrades(&self) {
        *self.state.upgrade_fault.lock() = None;
    }

    /// Player updates are recorded only once the delay has elapsed.
    pub fn delay_player_updates(&self, delay: Duration) {
        self.state
            .player_update_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn player_updates_started(&self) -> usize {
        self.state.player_updates_started.load(Ordering::SeqCst)
    }

    /// Every upgrade request seen, accepted or not.
    pub fn upgrade_attempts(&self) -> usize {
        self.state.handshake_headers.lock().len()
    }

    pub fn upgrades(&self) -> usize {
        self.state.upgrades.load(Ordering::SeqCst)
    }

    pub fn handshake_headers(&self) -> Vec<HeaderMap> {
        self.state.handshake_headers.lock().clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn requests_with(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

async fn websocket_handler(
    headers: HeaderMap,
    ws: WebSocketUpgrade,
    State(state): State<Arc<MockState>>,
) -> Response {
    let attempt = {
        let mut seen = state.handshake_headers.lock();
        seen.push(headers.clone());
        seen.len()
    };
    let fault = *state.upgrade_fault.lock();
    match fault {
        Some((after, UpgradeFault::Reject(status))) if attempt > after => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
            return (status, "Rejected").into_response();
        }
        Some((after, UpgradeFault::Stall(delay))) if attempt > after => {
            tokio::time::sleep(delay).await;
            return (StatusCode::SERVICE_UNAVAILABLE, "Stalled").into_response();
        }
        _ => {}
    }
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    state.upgrades.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<MockState>) {
    let mut pushed = state.push.subscribe();
    let n = state.sessions.fetch_add(1, Ordering::SeqCst) + 1;
    let ready = json!({"op": "ready", "resumed": false, "sessionId": format!("session-{}", n)});
    if socket
        .send(Message::Text(ready.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    if state.close_first.swap(false, Ordering::SeqCst) {
        let _ = socket.send(going_away()).await;
        return;
    }

    loop {
        tokio::select! {
            push = pushed.recv() => match push {
                Ok(Push::Frame(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(Push::Close) => {
                    let _ = socket.send(going_away()).await;
                    break;
                }
                Err(_) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

fn going_away() -> Message {
    Message::Close(Some(CloseFrame {
        code: 1001,
        reason: "going away".into(),
    }))
}

async fn load_tracks(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.requests.lock().push(RecordedRequest {
        method: "GET",
        path: "/v4/loadtracks".into(),
        query,
        body: Value::Null,
        authorization: authorization(&headers),
    });
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let status = StatusCode::from_u16(state.load_status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = state.load_body.lock().clone();
    (status, Json(body)).into_response()
}

async fn update_player(
    State(state): State<Arc<MockState>>,
    Path((session_id, guild_id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.player_updates_started.fetch_add(1, Ordering::SeqCst);
    let delay = state.player_update_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    state.requests.lock().push(RecordedRequest {
        method: "PATCH",
        path: format!("/v4/sessions/{}/players/{}", session_id, guild_id),
        query,
        body: body.clone(),
        authorization: authorization(&headers),
    });
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let track = body
        .get("encodedTrack")
        .and_then(Value::as_str)
        .map(|encoded| track_json(encoded, "Mock Song"))
        .unwrap_or(Value::Null);

    Json(json!({
        "guildId": guild_id,
        "track": track,
        "volume": body.get("volume").cloned().unwrap_or(json!(100)),
        "paused": body.get("paused").cloned().unwrap_or(json!(false)),
        "state": {"time": 1, "position": 0, "connected": true, "ping": 10},
        "voice": body.get("voice").cloned().unwrap_or(json!({"token": "", "endpoint": "", "sessionId": ""})),
        "filters": {}
    }))
    .into_response()
}

async fn destroy_player(
    State(state): State<Arc<MockState>>,
    Path((session_id, guild_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    state.requests.lock().push(RecordedRequest {
        method: "DELETE",
        path: format!("/v4/sessions/{}/players/{}", session_id, guild_id),
        query: HashMap::new(),
        body: Value::Null,
        authorization: authorization(&headers),
    });
    if authorized(&headers) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn update_session(
    State(state): State<Arc<MockState>>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().push(RecordedRequest {
        method: "PATCH",
        path: format!("/v4/sessions/{}", session_id),
        query: HashMap::new(),
        body: body.clone(),
        authorization: authorization(&headers),
    });

    Json(json!({
        "resuming": body.get("resuming").cloned().unwrap_or(json!(false)),
        "timeout": body.get("timeout").cloned().unwrap_or(json!(60)),
    }))
    .into_response()
}

pub fn test_config() -> Config {
    let mut config = Config::new(ClientConfig::new(USER_ID));
    config.reconnect.base_delay_ms = 20;
    config.reconnect.max_delay_ms = 100;
    config.reconnect.jitter = false;
    config.client.connect_timeout_ms = 2_000;
    config.client.request_timeout_ms = 2_000;
    config
}

pub fn registry() -> (NodeRegistry, UnboundedReceiver<ClientEvent>) {
    NodeRegistry::new(&test_config()).unwrap()
}

pub async fn next_event(rx: &mut UnboundedReceiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Skips events until one matches.
pub async fn wait_event(
    rx: &mut UnboundedReceiver<ClientEvent>,
    mut matches: impl FnMut(&ClientEvent) -> bool,
) -> ClientEvent {
    loop {
        let event = next_event(rx).await;
        if matches(&event) {
            return event;
        }
    }
}

pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
