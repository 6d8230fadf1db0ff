//! Preview server for the output directory.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use kiln_tasks::{Reload, ReloadSink};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;

use crate::websocket::{reload_client_script, ReloadHub, ReloadMessage};

/// WebSocket endpoint browsers connect to.
pub const RELOAD_SOCKET_PATH: &str = "/__kiln/reload";

/// Path of the injected reload client.
pub const RELOAD_SCRIPT_PATH: &str = "/__kiln/reload.js";

/// Configuration for a [`DevSession`].
#[derive(Debug, Clone)]
pub struct DevSessionConfig {
    /// Directory served at `/`
    pub output_dir: PathBuf,

    /// Port to listen on; 0 picks a free port
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevSessionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("dist"),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Port {0} is already in use")]
    PortUnavailable(u16),

    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    Bind(String, #[source] io::Error),
}

/// A running preview server with live reload.
///
/// The listener is bound before [`DevSession::start`] returns, so a port
/// conflict is reported immediately rather than from a background task.
#[derive(Debug)]
pub struct DevSession {
    addr: SocketAddr,
    hub: ReloadHub,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

impl DevSession {
    /// Bind the listener and start serving `config.output_dir`.
    pub async fn start(config: DevSessionConfig) -> Result<Self, ServerError> {
        let requested = format!("{}:{}", config.host, config.port);
        let addr: SocketAddr = requested
            .parse()
            .map_err(|_| ServerError::InvalidAddress(requested.clone()))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::AddrInUse => ServerError::PortUnavailable(config.port),
                _ => ServerError::Bind(requested.clone(), e),
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(requested, e))?;

        let hub = ReloadHub::new();
        let app = Router::new()
            .route(RELOAD_SOCKET_PATH, get(ws_handler))
            .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
            .fallback_service(ServeDir::new(&config.output_dir))
            .with_state(hub.clone());

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} at {}", config.output_dir.display(), url);

        if config.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Could not open browser: {}", e);
            }
        }

        Ok(Self {
            addr,
            hub,
            shutdown,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Handle for broadcasting reloads, usable as the scheduler's sink.
    pub fn hub(&self) -> ReloadHub {
        self.hub.clone()
    }

    /// Stop accepting connections and wait briefly for open ones to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        match tokio::time::timeout(Duration::from_secs(2), self.task).await {
            Ok(Ok(Err(e))) => tracing::warn!("Server error during shutdown: {}", e),
            Ok(_) => {}
            // live-reload sockets hold connections open
            Err(_) => tracing::debug!("Server shutdown timed out"),
        }
    }
}

impl ReloadSink for DevSession {
    fn notify(&self, reload: Reload) {
        self.hub.notify(reload);
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if !send(&mut socket, &ReloadMessage::Connected).await {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(msg) => {
                    if !send(&mut socket, &msg).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "reload client lagged");
                    if !send(&mut socket, &ReloadMessage::Reload).await {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Serialize and send `msg`; false once the socket is gone.
async fn send(socket: &mut WebSocket, msg: &ReloadMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn reload_script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        reload_client_script(RELOAD_SOCKET_PATH),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_test::{assert_err, assert_ok};

    fn config(output_dir: PathBuf) -> DevSessionConfig {
        DevSessionConfig {
            output_dir,
            port: 0,
            open: false,
            ..Default::default()
        }
    }

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            path, addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn serves_output_directory() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("about")).unwrap();
        fs::write(temp.path().join("index.html"), "<h1>Home</h1>").unwrap();
        fs::write(temp.path().join("about/index.html"), "<h1>About</h1>").unwrap();

        let session = DevSession::start(config(temp.path().to_path_buf()))
            .await
            .unwrap();

        let home = get(session.addr(), "/").await;
        assert!(home.starts_with("HTTP/1.1 200"), "{home}");
        assert!(home.contains("<h1>Home</h1>"));

        let about = get(session.addr(), "/about/").await;
        assert!(about.contains("<h1>About</h1>"));

        let missing = get(session.addr(), "/nope.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

        session.shutdown().await;
    }

    #[tokio::test]
    async fn serves_reload_client() {
        let temp = tempdir().unwrap();
        let session = assert_ok!(DevSession::start(config(temp.path().to_path_buf())).await);

        let response = get(session.addr(), RELOAD_SCRIPT_PATH).await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("application/javascript"));
        assert!(response.contains("new WebSocket"));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn reports_port_in_use() {
        let temp = tempdir().unwrap();
        let first = DevSession::start(config(temp.path().to_path_buf()))
            .await
            .unwrap();

        let taken = DevSessionConfig {
            port: first.addr().port(),
            ..config(temp.path().to_path_buf())
        };
        let err = assert_err!(DevSession::start(taken).await);

        assert!(matches!(err, ServerError::PortUnavailable(p) if p == first.addr().port()));
        first.shutdown().await;
    }

    #[tokio::test]
    async fn session_notifications_reach_subscribers() {
        let temp = tempdir().unwrap();
        let session = DevSession::start(config(temp.path().to_path_buf()))
            .await
            .unwrap();
        let mut rx = session.hub().subscribe();

        session.notify(Reload::Full);

        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
        session.shutdown().await;
    }
}
