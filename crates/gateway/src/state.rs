use {herald_routing::RouteManager, std::sync::Arc};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RouteManager>,
    pub version: &'static str,
}

impl AppState {
    pub fn new(manager: Arc<RouteManager>) -> Self {
        Self {
            manager,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}
