// ABOUTME: Web shell for seeuthere: Axum router, auth gate layer, Askama pages and backend client.
// ABOUTME: Page navigation resolves through the core route table and renders with explicit page contexts.

pub mod api_client;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod cookies;
pub mod devtools;
pub mod routes;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod visitors;
pub mod web;

pub use api_client::{BackendApi, HttpBackend};
pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, ShellConfig};
pub use routes::create_router;
pub use visitors::{VisitorError, VisitorLimits, VisitorStore};
