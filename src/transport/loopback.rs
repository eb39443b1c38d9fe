//! # Loopback Transport
//!
//! In-process transport that answers fetches and echoes socket traffic on a
//! tokio runtime. Deliveries happen on runtime worker threads, never on the
//! caller's thread, so it exercises the same cross-thread path as a real
//! network stack.
//!
//! - Fetch: answered by a [`FetchResponder`]. The default echoes the request
//!   body with status 200 for `http(s)` URLs and reports an error otherwise.
//! - Socket: `ws://` / `wss://` URLs open; anything else fails with a
//!   terminal error. Sent messages are echoed back; `close` delivers a close
//!   event. Events for one connection are delivered in order.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{FetchDelivery, FetchResponse, FetchTransport, SocketDelivery, SocketTransport};
use crate::constants::close_codes;
use crate::registry::CorrelationId;

/// Produces the response for `(url, body)`
pub type FetchResponder = Arc<dyn Fn(&str, &str) -> FetchResponse + Send + Sync>;

enum SocketCommand {
    Send(String),
    Close { code: i32, reason: String },
}

type Connections = Arc<DashMap<CorrelationId, mpsc::UnboundedSender<SocketCommand>>>;

/// Transport answering requests in-process
pub struct LoopbackTransport {
    runtime: Handle,
    responder: FetchResponder,
    latency: Duration,
    connections: Connections,
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("latency", &self.latency)
            .field("open_connections", &self.open_connections())
            .finish()
    }
}

impl LoopbackTransport {
    /// Create a transport delivering on `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            responder: Arc::new(Self::default_response),
            latency: Duration::ZERO,
            connections: Arc::new(DashMap::new()),
        }
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str, &str) -> FetchResponse + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// Delay applied before each fetch response and each connection opening
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Echo the body for http(s) URLs, fail for anything else
    pub fn default_response(url: &str, body: &str) -> FetchResponse {
        if url.starts_with("http://") || url.starts_with("https://") {
            FetchResponse::ok(200, body)
        } else {
            FetchResponse::failed(format!("unsupported url scheme: {url}"))
        }
    }

    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    /// Drop every connection with an abnormal close event
    pub fn disconnect_all(&self, reason: &str) -> usize {
        let tokens: Vec<CorrelationId> = self.connections.iter().map(|e| *e.key()).collect();
        for token in &tokens {
            self.close(*token, close_codes::ABNORMAL, reason);
        }
        tokens.len()
    }

    fn is_websocket_url(url: &str) -> bool {
        url.starts_with("ws://") || url.starts_with("wss://")
    }
}

impl FetchTransport for LoopbackTransport {
    fn invoke_fetch(
        &self,
        id: CorrelationId,
        url: &str,
        body: &str,
        delivery: Arc<dyn FetchDelivery>,
    ) {
        debug!(id = id, url = %url, "Loopback fetch requested");
        let responder = Arc::clone(&self.responder);
        let latency = self.latency;
        let url = url.to_string();
        let body = body.to_string();

        self.runtime.spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let response = responder(&url, &body);
            delivery.deliver(id, response);
        });
    }
}

impl SocketTransport for LoopbackTransport {
    fn connect(&self, token: CorrelationId, url: &str, delivery: Arc<dyn SocketDelivery>) {
        if !Self::is_websocket_url(url) {
            let error = format!("invalid websocket url: {url}");
            self.runtime.spawn(async move {
                delivery.deliver_error(token, error);
            });
            return;
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        self.connections.insert(token, sender);
        debug!(token = token, url = %url, "Loopback socket connecting");

        self.runtime.spawn(run_connection(
            token,
            delivery,
            receiver,
            Arc::clone(&self.connections),
            self.latency,
        ));
    }

    fn send(&self, token: CorrelationId, message: &str) {
        let sent = self
            .connections
            .get(&token)
            .map(|sender| sender.send(SocketCommand::Send(message.to_string())).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!(token = token, "Loopback send on unknown or closed connection");
        }
    }

    fn close(&self, token: CorrelationId, code: i32, reason: &str) {
        match self.connections.remove(&token) {
            Some((_, sender)) => {
                let _ = sender.send(SocketCommand::Close {
                    code,
                    reason: reason.to_string(),
                });
            }
            None => warn!(token = token, "Loopback close on unknown connection"),
        }
    }
}

async fn run_connection(
    token: CorrelationId,
    delivery: Arc<dyn SocketDelivery>,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
    connections: Connections,
    latency: Duration,
) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    delivery.deliver_open(token);

    while let Some(command) = commands.recv().await {
        match command {
            SocketCommand::Send(message) => {
                delivery.deliver_message(token, message);
            }
            SocketCommand::Close { code, reason } => {
                delivery.deliver_close(token, code, reason);
                break;
            }
        }
    }

    connections.remove(&token);
    debug!(token = token, "Loopback socket finished");
}
