//                                  Order Relay
//
// Streams live order notifications to browsers. Each `/orders/stream` caller
// gets its own relay of the backend's order stream; `/orders/events` fans out
// the order changes this process itself forwarded to the backend.

use events::EventPublisher;
use log::{error, info};
use service::{config::Config, logging::Logger, AppState};
use sse::domain_event_handler::SseDomainEventHandler;
use sse::Manager;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting order relay [{}] against backend {}",
        config.runtime_env(),
        config.backend_base_url()
    );

    let http_client = match service::init_http_client(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build backend HTTP client: {e}");
            std::process::exit(1);
        }
    };

    let sse_manager = Arc::new(Manager::with_limits(
        config.sse_client_buffer,
        config.sse_max_lagged_frames,
    ));

    let event_publisher = EventPublisher::new()
        .with_handler(Arc::new(SseDomainEventHandler::new(sse_manager.clone())));

    let app_state = AppState::new(config, http_client, &sse_manager, event_publisher);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with error: {e}");
        std::process::exit(1);
    }

    info!("Order relay stopped");
}
