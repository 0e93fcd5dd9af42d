//! Relay server
//!
//! Binds the HTTP/WebSocket listener, starts the capture process and tears
//! both down on shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::config::ServerConfig;
use super::routes::build_router;
use super::state::AppState;
use crate::capture::{CaptureHandle, CaptureSupervisor};
use crate::error::Result;
use crate::hub::BroadcastHub;
use crate::rooms::{FileStore, MemoryStore, RoomStore};
use crate::stats::PipelineStats;

/// Packet relay server
#[derive(Debug)]
pub struct RelayServer {
    config: ServerConfig,
    state: AppState,
}

impl RelayServer {
    /// Create a server over an existing room store
    pub fn new(config: ServerConfig, store: Arc<dyn RoomStore>) -> Self {
        let hub = Arc::new(BroadcastHub::with_config(config.hub.clone()));
        let stats = Arc::new(PipelineStats::new());
        let state = AppState::new(hub, store, stats);
        Self { config, state }
    }

    /// Create a server with the store named by `config.data_file`
    ///
    /// Uses a file store when a data file is configured, memory otherwise.
    pub async fn open(config: ServerConfig) -> Result<Self> {
        let store: Arc<dyn RoomStore> = match &config.data_file {
            Some(path) => {
                let store = FileStore::open(path).await?;
                tracing::info!(path = %path.display(), "Room store loaded");
                Arc::new(store)
            }
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(config, store))
    }

    /// Server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared handler state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.state.hub
    }

    /// Router with the configured middleware
    pub fn router(&self) -> Router {
        let router = build_router(self.state.clone()).layer(TraceLayer::new_for_http());

        if self.config.cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        let capture = self.start_capture();

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(handle) = capture {
            let state = handle.shutdown().await;
            tracing::info!(state = ?state, "Capture stopped");
        }

        tracing::info!("Relay server stopped");
        result.map_err(Into::into)
    }

    /// Spawn the capture process if enabled
    ///
    /// A capture that fails to start leaves the server running without
    /// telemetry.
    fn start_capture(&self) -> Option<CaptureHandle> {
        if !self.config.capture.enabled {
            tracing::info!("Capture disabled");
            return None;
        }

        let supervisor = CaptureSupervisor::new(
            self.config.capture.clone(),
            Arc::clone(&self.state.hub),
            Arc::clone(&self.state.stats),
        );

        match supervisor.start() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Serving without telemetry");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::capture::CaptureConfig;

    fn config() -> ServerConfig {
        ServerConfig::with_addr("127.0.0.1:0".parse().unwrap()).capture(CaptureConfig::disabled())
    }

    #[tokio::test]
    async fn test_open_without_data_file_uses_memory() {
        let server = RelayServer::open(config()).await.unwrap();
        let room = server
            .state()
            .gateway
            .create_room("ops", "k1")
            .await
            .unwrap();
        assert_eq!(room.name, "ops");
    }

    #[tokio::test]
    async fn test_open_with_data_file_reloads_rooms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.json");

        let server = RelayServer::open(config().data_file(&path)).await.unwrap();
        server.state().gateway.create_room("ops", "k1").await.unwrap();
        drop(server);

        let server = RelayServer::open(config().data_file(&path)).await.unwrap();
        let room = server.state().gateway.find_room("k1").await.unwrap();
        assert_eq!(room.name, "ops");
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let server = Arc::new(RelayServer::open(config()).await.unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve(listener, async move {
                        let _ = stop_rx.await;
                    })
                    .await
            })
        };

        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        conn.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("Server is running..."));

        stop_tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
