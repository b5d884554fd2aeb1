//! Bridge API between the web view and the thermometer plugin.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information
//! - `GET /api/v1/thermometer` - Session status and last accepted reading
//! - `GET /api/v1/thermometer/current` - Wait for the next reading
//! - `POST /api/v1/thermometer/{action}` - Hold (`start`) or release (`stop`) the sensor
//! - `WS /api/v1/thermometer/ws` - Exec, watch and one-shot reads over one socket
//!
//! ## Example
//!
//! ```no_run
//! use thermometer_bridge::api::{serve, AppState, ServerConfig};
//! use thermometer_bridge::{SessionOptions, SimulatorSettings};
//!
//! #[tokio::main]
//! async fn main() -> thermometer_bridge::Result<()> {
//!     let state = AppState::simulated(SimulatorSettings::default(), SessionOptions::default());
//!     serve(ServerConfig::new("127.0.0.1", 3000), state, std::future::pending()).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

pub use handlers::AppState;
pub use router::{create_router, serve, ServerConfig};
pub use types::{ErrorResponse, ExecResponse, StatusResponse, WsMessage};
