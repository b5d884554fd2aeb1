//! API router configuration.

use axum::{
    routing::{any, get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_info, current_temperature, exec_action, health, thermometer_status, AppState,
};
use super::websocket::ws_handler;
use crate::error::BridgeError;

/// Create the API router with the given state.
pub fn create_router(state: AppState) -> Router {
    let thermometer_routes = Router::new()
        .route("/", get(thermometer_status))
        .route("/current", get(current_temperature))
        .route("/ws", any(ws_handler))
        .route("/{action}", post(exec_action));

    let api_v1 = Router::new()
        .route("/", get(api_info))
        .nest("/thermometer", thermometer_routes);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Start the bridge server, returning when `shutdown` resolves.
pub async fn serve<F>(config: ServerConfig, state: AppState, shutdown: F) -> crate::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_address();
    let router = create_router(state);

    tracing::info!("Starting thermometer bridge on {}", addr);

    let listener = TcpListener::bind(&addr).await.map_err(BridgeError::Io)?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(BridgeError::Io)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SessionOptions;
    use crate::simulator::SimulatorSettings;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_server_config_custom() {
        let config = ServerConfig::new("0.0.0.0", 8080);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn test_router_creation() {
        let state = AppState::simulated(SimulatorSettings::default(), SessionOptions::default());
        let _router = create_router(state);
    }
}
