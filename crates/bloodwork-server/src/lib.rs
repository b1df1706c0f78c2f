pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mapping;
pub mod middleware;
pub mod observability;
pub mod patch;
pub mod records;
pub mod routes;
pub mod search;
pub mod server;

pub use config::{AppConfig, AuthSettings, LoggingConfig, SearchSettings, ServerConfig};
pub use observability::init_tracing;
pub use records::RecordService;
pub use server::{AppState, BloodworkServer, ServerBuilder, build_app, build_app_with_state};
