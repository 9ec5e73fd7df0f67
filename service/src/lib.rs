use config::Config;
use events::EventPublisher;
use log::info;
use sse::Manager;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod logging;

/// Builds the shared backend HTTP client.
///
/// Only the connect phase is bounded here: the order stream is long-lived, so a
/// whole-request timeout would cut it off. Plain JSON calls set their own
/// per-request timeout from `Config::backend_timeout`.
pub fn init_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    info!(
        "Backend client config: base_url={}, connect_timeout={}s, request_timeout={}s",
        config.backend_base_url(),
        config.backend_connect_timeout_secs,
        config.backend_timeout_secs,
    );

    reqwest::Client::builder()
        .connect_timeout(config.backend_connect_timeout())
        .user_agent(format!("order-relay/{}", env!("CARGO_PKG_VERSION")))
        .build()
}

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub sse_manager: Arc<Manager>,
    pub event_publisher: EventPublisher,
    /// Cancelled once when the process begins shutting down.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        app_config: Config,
        http_client: reqwest::Client,
        sse_manager: &Arc<Manager>,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            config: app_config,
            http_client,
            sse_manager: Arc::clone(sse_manager),
            event_publisher,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop relay sessions and close every local feed connection.
    pub fn begin_shutdown(&self) {
        info!("Shutting down live order feeds");
        self.shutdown.cancel();
        self.sse_manager.shutdown();
    }
}
