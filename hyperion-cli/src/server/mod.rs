//! HTTP server mode: documents are posted, run in the background and
//! their results collected by id

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use color_eyre::Result;
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

/// Address the server binds to
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

/// Serve until Ctrl+C
pub async fn start_server(config: ServerConfig, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C signal");
            }
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
