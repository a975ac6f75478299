//! # Medley Server
//!
//! HTTP surface of the medley music library: root directory settings,
//! manual rescans and library statistics.

pub mod app;
pub mod config;
pub mod error;
pub mod handler;
pub mod routes;

pub use app::App;
pub use config::ServerConfig;
pub use error::ApiError;
pub use handler::SettingsHandler;
pub use routes::router;
