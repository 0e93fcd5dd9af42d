//! HTTP and WebSocket front end

pub mod config;
pub mod error;
pub mod listener;
pub mod routes;
pub mod socket;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use listener::RelayServer;
pub use routes::build_router;
pub use state::AppState;
