//! [`ApiServer`] – HTTP listener for the bridge API.
//!
//! Listens on `0.0.0.0:8080` (configurable via [`ApiServer::with_port`]) and
//! serves the [`router`] with `axum::serve`.

use std::net::SocketAddr;
use std::sync::Arc;

use plcbridge_types::BridgeError;
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::{ApiState, router};

/// Default TCP port for the API server.
pub const DEFAULT_PORT: u16 = 8080;

// ---------------------------------------------------------------------------
// ApiServer
// ---------------------------------------------------------------------------

/// HTTP server over a shared [`ApiState`].
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server over `state` on the [`DEFAULT_PORT`].
    pub fn new(state: Arc<ApiState>) -> Self {
        Self {
            state,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind and serve until the task is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] if the TCP listener cannot bind or
    /// the server stops with an I/O error.
    pub async fn run(self) -> Result<(), BridgeError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| BridgeError::Transport(format!("bind error on {addr}: {e}")))?;

        info!(port = self.port, "API listening on http://localhost:{}", self.port);
        serve(listener, self.state).await
    }
}

/// Serve the API over an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<ApiState>) -> Result<(), BridgeError> {
    axum::serve(listener, router(state))
        .await
        .map_err(|e| BridgeError::Transport(format!("API server stopped: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcbridge_core::{CommandPublisher, HealthService, QueryService, TopicCounter};
    use plcbridge_middleware::{BusMessage, MessageBus};
    use plcbridge_store::{RecordStore, SqliteRecordStore};
    use plcbridge_types::DeviceStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::broadcast;

    fn make_state() -> (Arc<ApiState>, broadcast::Receiver<BusMessage>) {
        let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
        store.save_status(DeviceStatus::new(5)).unwrap();
        let (bus, _inbound) = MessageBus::new(16);
        let outbound = bus.subscribe();
        let state = Arc::new(ApiState {
            query: QueryService::new(store.clone()),
            commands: CommandPublisher::new(Arc::new(bus)),
            health: HealthService::new("plcbridge", store, Arc::new(TopicCounter::new())),
        });
        (state, outbound)
    }

    /// Send `raw` over a fresh connection and read until the server closes it.
    async fn exchange(state: Arc<ApiState>, raw: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, state));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(raw.as_bytes()).await.unwrap();
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        server.abort();
        out
    }

    // ── ApiServer constructor ───────────────────────────────────────────────

    #[test]
    fn default_port_is_8080() {
        let (state, _) = make_state();
        assert_eq!(ApiServer::new(state).port(), DEFAULT_PORT);
    }

    #[test]
    fn with_port_overrides_default() {
        let (state, _) = make_state();
        assert_eq!(ApiServer::new(state).with_port(9999).port(), 9999);
    }

    // ── Over the socket ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn serves_status_with_cors_headers() {
        let (state, _) = make_state();
        let out = exchange(
            state,
            "GET /api/wago/status/latest HTTP/1.1\r\nHost: x\r\nOrigin: http://dashboard.local\r\nConnection: close\r\n\r\n",
        )
        .await
        .to_ascii_lowercase();
        assert!(out.starts_with("http/1.1 200 ok\r\n"), "{out}");
        assert!(out.contains("access-control-allow-origin: *"), "{out}");
        assert!(out.contains("content-type: application/json"), "{out}");
        assert!(out.contains(r#""status":5"#), "{out}");
    }

    #[tokio::test]
    async fn content_length_body_is_read() {
        let (state, _) = make_state();
        let body = r#"{"code":9}"#;
        let raw = format!(
            "POST /api/wago/control HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let out = exchange(state, &raw).await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{out}");
        assert!(out.contains("Command must be between 0 and 3"), "{out}");
    }

    #[tokio::test]
    async fn chunked_control_body_is_accepted() {
        let (state, mut outbound) = make_state();
        let raw = "POST /api/wago/control HTTP/1.1\r\n\
                   Host: x\r\n\
                   Content-Type: application/json\r\n\
                   Transfer-Encoding: chunked\r\n\
                   Connection: close\r\n\
                   \r\n\
                   5\r\n{\"cod\r\n\
                   6\r\ne\": 2}\r\n\
                   0\r\n\r\n";
        let out = exchange(state, raw).await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
        assert!(out.contains("Command sent: 2"), "{out}");

        let sent = outbound.try_recv().unwrap();
        assert_eq!(sent.payload, "2");
    }
}
