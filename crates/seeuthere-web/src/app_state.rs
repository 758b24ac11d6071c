// ABOUTME: Shared application state for the seeuthere web shell.
// ABOUTME: Holds the route table, auth gate, query cache, backend client, and per-visitor participants.

use std::sync::Arc;

use seeuthere_core::{AuthGate, Page, QueryClient, QueryOptions, RouteTable};

use crate::api_client::{BackendApi, HttpBackend};
use crate::config::ShellConfig;
use crate::visitors::{VisitorLimits, VisitorStore};

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub config: ShellConfig,
    pub routes: Arc<RouteTable>,
    pub gate: AuthGate,
    pub queries: Arc<QueryClient>,
    pub api: Arc<dyn BackendApi>,
    /// Participant state keyed by the visitor cookie.
    pub visitors: VisitorStore,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Production wiring: standard routes, default query options, HTTP backend.
    pub fn from_config(config: ShellConfig) -> Self {
        let api = Arc::new(HttpBackend::new(config.api_base_url.clone()));
        Self::new(config, api, QueryOptions::default())
    }

    pub fn new(config: ShellConfig, api: Arc<dyn BackendApi>, options: QueryOptions) -> Self {
        let routes = RouteTable::standard();
        let gate = routes
            .path_of(Page::Login)
            .map(AuthGate::new)
            .unwrap_or_default();
        Self {
            config,
            routes: Arc::new(routes),
            gate,
            queries: Arc::new(QueryClient::new(options)),
            api,
            visitors: VisitorStore::default(),
        }
    }

    pub fn with_visitor_limits(mut self, limits: VisitorLimits) -> Self {
        self.visitors = VisitorStore::new(limits);
        self
    }

    /// Path of `page` in the route table, for links and redirects.
    pub fn path_of(&self, page: Page) -> &'static str {
        self.routes.path_of(page).unwrap_or("/")
    }
}
