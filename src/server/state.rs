use std::sync::Arc;

use crate::config::Settings;
use crate::registry::ConnectionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(settings.websocket.clone()));

        Self {
            settings: Arc::new(settings),
            registry,
        }
    }
}
