//! `SocketServer`: Axum HTTP server carrying the WebSocket endpoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use sockwire_settings::SockwireSettings;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::registry::MethodRegistry;
use crate::websocket::{ChannelTable, SessionContext, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Dependencies handed to every session.
    pub session: SessionContext,
    /// Maximum inbound WebSocket message size.
    pub max_message_size: usize,
    /// When the server started.
    pub start_time: Instant,
}

/// The socket server.
#[derive(Debug)]
pub struct SocketServer {
    settings: SockwireSettings,
    registry: Arc<MethodRegistry>,
    channels: Arc<ChannelTable>,
    shutdown: CancellationToken,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl SocketServer {
    /// Create a new server.
    ///
    /// `settings` are validated first; a zero ping interval or queue
    /// capacity would otherwise fail inside every session.
    pub fn new(settings: SockwireSettings, registry: MethodRegistry) -> Result<Self, ServerError> {
        settings.validate()?;
        Ok(Self {
            settings,
            registry: Arc::new(registry),
            channels: Arc::new(ChannelTable::new()),
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
            metrics: None,
        })
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            session: SessionContext {
                registry: Arc::clone(&self.registry),
                channels: Arc::clone(&self.channels),
                settings: self.settings.channel.clone(),
                shutdown: self.shutdown.clone(),
            },
            max_message_size: self.settings.server.max_message_size,
            start_time: self.start_time,
        };

        let mut router = Router::new()
            .route(&self.settings.server.path, get(ws_handler))
            .route("/health", get(health_handler));
        if let Some(handle) = self.metrics.clone() {
            router = router.route(
                "/metrics",
                get(move || {
                    let handle = handle.clone();
                    async move { handle.render() }
                }),
            );
        }
        router.with_state(state)
    }

    /// Bind the configured address and serve in the background.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task,
    /// which finishes after [`Self::shutdown`].
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let host = self.settings.server.host.as_str();
        let listener = TcpListener::bind((host, self.settings.server.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, path = %self.settings.server.path, "socket server listening");

        let router = self.router();
        let token = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "socket server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// Stop accepting connections and close every live channel.
    pub fn shutdown(&self) {
        info!(channels = self.channels.count(), "shutting down socket server");
        self.shutdown.cancel();
        self.channels.close_all();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Live channels.
    pub fn channels(&self) -> &Arc<ChannelTable> {
        &self.channels
    }

    /// Event handlers.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Server settings.
    pub fn settings(&self) -> &SockwireSettings {
        &self.settings
    }
}

/// GET on the socket path: upgrade to a WebSocket session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let channel_id = Uuid::now_v7().to_string();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, channel_id, state.session))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let channels = state.session.channels.count();
    Json(health::health_check(state.start_time, channels))
}
