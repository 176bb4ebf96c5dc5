use std::sync::Arc;

use crate::gateway::Gateway;
use crate::services::SessionService;
use crate::store::DataStore;

/// Shared application state: the store handle everything else hangs off.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub fn gateway(&self) -> Gateway {
        Gateway::new(self.store.clone())
    }

    pub fn sessions(&self) -> SessionService {
        SessionService::new(self.store.clone())
    }
}
