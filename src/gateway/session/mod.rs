use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderMap, HeaderValue},
        protocol::Message,
    },
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, info, warn};

use crate::{
    common::{HandshakeFailure, types::SessionId, types::UserId},
    events::ClientEvent,
    node::Node,
};

pub mod backoff;
pub mod handler;
pub mod types;

use self::{
    backoff::Backoff,
    types::{ConnectionState, SessionOutcome, classify},
};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Everything needed to open the event stream of one node.
#[derive(Debug, Clone)]
pub(crate) struct HandshakeRequest {
    pub url: String,
    pub password: String,
    pub user_id: UserId,
    pub client_name: String,
    /// Previous session to resume, if resuming is enabled.
    pub session_id: Option<SessionId>,
    pub timeout: Duration,
}

impl HandshakeRequest {
    fn headers(&self) -> Result<HeaderMap, HandshakeFailure> {
        let value = |v: &str| {
            HeaderValue::from_str(v).map_err(|e| HandshakeFailure::Protocol(e.to_string()))
        };

        let mut headers = HeaderMap::new();
        headers.insert("authorization", value(&self.password)?);
        headers.insert("user-id", value(&self.user_id.to_string())?);
        headers.insert("client-name", value(&self.client_name)?);
        if let Some(session_id) = &self.session_id {
            headers.insert("session-id", value(session_id)?);
        }
        Ok(headers)
    }
}

/// Performs the upgrade handshake, bounded by the request timeout.
pub(crate) async fn handshake(request: &HandshakeRequest) -> Result<WsStream, HandshakeFailure> {
    let mut upgrade = request
        .url
        .as_str()
        .into_client_request()
        .map_err(classify)?;
    upgrade.headers_mut().extend(request.headers()?);

    match tokio::time::timeout(
        request.timeout,
        tokio_tungstenite::connect_async(upgrade),
    )
    .await
    {
        Err(_) => Err(HandshakeFailure::TimedOut),
        Ok(Err(e)) => Err(classify(e)),
        Ok(Ok((stream, response))) => {
            debug!(
                "Event stream upgrade to {} answered {}",
                request.url,
                response.status()
            );
            Ok(stream)
        }
    }
}

/// Connection bookkeeping owned 1:1 by a [`Node`].
///
/// At most one supervisor task runs per connection. Destroy is terminal and
/// observed by every wait in the supervisor.
pub struct Connection {
    state: Mutex<ConnectionState>,
    destroyed: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            destroyed: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_cancelled()
    }

    /// No-op once destroyed.
    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.lock();
        if *current != ConnectionState::Destroyed {
            *current = state;
        }
    }

    /// Moves `Disconnected -> Connecting`. Returns false when a connect or a
    /// supervisor is already active.
    pub(crate) fn begin_connect(&self) -> bool {
        let mut current = self.state.lock();
        if *current == ConnectionState::Disconnected {
            *current = ConnectionState::Connecting;
            true
        } else {
            false
        }
    }

    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.destroyed.cancelled()
    }

    pub(crate) fn store_task(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.task.lock().replace(handle) {
            if !previous.is_finished() {
                previous.abort();
            }
        }
    }

    pub(crate) fn destroy(&self) {
        self.destroyed.cancel();
        *self.state.lock() = ConnectionState::Destroyed;
    }

    /// Waits up to `grace` for the supervisor to exit, aborting it afterwards.
    pub(crate) async fn join(&self, grace: Duration) {
        let Some(mut handle) = self.task.lock().take() else {
            return;
        };
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            handle.abort();
        }
    }
}

/// Supervises one node's event stream: receives frames until the stream
/// ends, then reconnects with backoff until destroyed or out of attempts.
pub(crate) async fn run(node: Arc<Node>, mut stream: WsStream) {
    let mut backoff = Backoff::new(node.reconnect_config());

    loop {
        let (code, reason) = match receive(&node, &mut stream).await {
            SessionOutcome::Shutdown => {
                debug!("[{}] Event stream shutting down cleanly", node.identifier());
                let _ = stream.close(None).await;
                break;
            }
            SessionOutcome::Closed { code, reason } => (code, reason),
        };

        info!(
            "[{}] Event stream closed: code={:?}, reason='{}'",
            node.identifier(),
            code,
            reason
        );
        node.emit(ClientEvent::NodeDisconnected {
            node: node.clone(),
            code,
            reason,
        });

        if node.connection().is_destroyed() {
            break;
        }
        node.connection().set_state(ConnectionState::Reconnecting);

        match reconnect(&node, &mut backoff).await {
            Some(fresh) => {
                stream = fresh;
                node.connection().set_state(ConnectionState::Connected);
            }
            None => break,
        }
    }

    node.connection().set_state(ConnectionState::Disconnected);
}

async fn receive(node: &Arc<Node>, stream: &mut WsStream) -> SessionOutcome {
    loop {
        let message = tokio::select! {
            biased;
            _ = node.connection().cancelled() => return SessionOutcome::Shutdown,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => handler::dispatch(node, text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame
                    .map(|cf| (Some(u16::from(cf.code)), cf.reason.as_str().to_string()))
                    .unwrap_or((None, "No reason".into()));
                return SessionOutcome::Closed { code, reason };
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("[{}] Event stream read error: {}", node.identifier(), e);
                return SessionOutcome::Closed {
                    code: None,
                    reason: e.to_string(),
                };
            }
            None => {
                return SessionOutcome::Closed {
                    code: None,
                    reason: "Stream ended".into(),
                };
            }
        }
    }
}

/// Retries the handshake until it succeeds, a terminal failure occurs, the
/// backoff is exhausted, or the node is destroyed.
async fn reconnect(node: &Arc<Node>, backoff: &mut Backoff) -> Option<WsStream> {
    loop {
        if backoff.is_exhausted() {
            warn!(
                "[{}] Giving up after {} reconnect attempts",
                node.identifier(),
                backoff.attempt()
            );
            return None;
        }

        let delay = backoff.next();
        debug!(
            "[{}] Reconnecting in {:?} (attempt {})",
            node.identifier(),
            delay,
            backoff.attempt()
        );
        tokio::select! {
            biased;
            _ = node.connection().cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        let request = node.handshake_request();
        let result = tokio::select! {
            biased;
            _ = node.connection().cancelled() => return None,
            result = handshake(&request) => result,
        };

        match result {
            Ok(stream) if node.connection().is_destroyed() => {
                drop(stream);
                return None;
            }
            Ok(stream) => {
                info!("[{}] Reconnected to node", node.identifier());
                backoff.reset();
                return Some(stream);
            }
            Err(failure) if failure.is_transient() => {
                warn!("[{}] Reconnect failed: {}", node.identifier(), failure);
            }
            Err(failure) => {
                error!(
                    "[{}] Reconnect failed permanently: {}",
                    node.identifier(),
                    failure
                );
                return None;
            }
        }
    }
}
